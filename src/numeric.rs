//! Encryptors for arbitrary-precision numbers
//!
//! A number is encrypted through its canonical two's-complement big-endian
//! byte form. The encrypted bytes, followed by their length as a 4-byte
//! big-endian integer, are read back as a signed integer. Decryption uses
//! the stored length to restore the leading sign bytes that the integer
//! representation drops.

use crate::encryptor::{Encryptor, StandardPbeEncryptor};
use crate::error::{PbeError, Result};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};

/// Size of the trailing length field.
const LENGTH_LEN: usize = 4;

pub type StandardPbeBigIntegerEncryptor = StandardPbeEncryptor<BigInt>;

pub type StandardPbeBigDecimalEncryptor = StandardPbeEncryptor<BigDecimal>;

fn encrypt_integer(
    encrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>>,
    message: &BigInt,
) -> Result<BigInt> {
    let mut encrypted = encrypt(&message.to_signed_bytes_be())?;
    let len = u32::try_from(encrypted.len()).map_err(|_| PbeError::operation_not_possible())?;
    encrypted.extend_from_slice(&len.to_be_bytes());
    Ok(BigInt::from_signed_bytes_be(&encrypted))
}

fn decrypt_integer(
    decrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>>,
    encrypted_message: &BigInt,
) -> Result<BigInt> {
    let bytes = restore_sign_bytes(encrypted_message)?;
    let message = decrypt(&bytes[..bytes.len() - LENGTH_LEN])?;
    Ok(BigInt::from_signed_bytes_be(&message))
}

/// Recovers the exact `[encrypted][length]` byte sequence behind `value`.
fn restore_sign_bytes(value: &BigInt) -> Result<Vec<u8>> {
    let bytes = value.to_signed_bytes_be();
    if bytes.len() < LENGTH_LEN {
        return Err(PbeError::operation_not_possible());
    }
    let mut len_bytes = [0u8; LENGTH_LEN];
    len_bytes.copy_from_slice(&bytes[bytes.len() - LENGTH_LEN..]);
    let expected = usize::try_from(u32::from_be_bytes(len_bytes))
        .ok()
        .and_then(|len| len.checked_add(LENGTH_LEN))
        .ok_or_else(PbeError::operation_not_possible)?;
    if bytes.len() > expected {
        return Err(PbeError::operation_not_possible());
    }

    let fill = if value.sign() == Sign::Minus { 0xff } else { 0x00 };
    let mut restored = vec![fill; expected - bytes.len()];
    restored.extend_from_slice(&bytes);
    Ok(restored)
}

impl Encryptor for StandardPbeEncryptor<BigInt> {
    type Message = BigInt;

    fn encrypt(&self, message: &BigInt) -> Result<BigInt> {
        let engine = self.engine()?;
        encrypt_integer(|bytes| engine.encrypt(bytes), message)
    }

    fn decrypt(&self, encrypted_message: &BigInt) -> Result<BigInt> {
        let engine = self.engine()?;
        decrypt_integer(|bytes| engine.decrypt(bytes), encrypted_message)
    }
}

/// The unscaled value is encrypted; the scale is kept as is.
impl Encryptor for StandardPbeEncryptor<BigDecimal> {
    type Message = BigDecimal;

    fn encrypt(&self, message: &BigDecimal) -> Result<BigDecimal> {
        let engine = self.engine()?;
        let (unscaled, scale) = message.as_bigint_and_exponent();
        let encrypted = encrypt_integer(|bytes| engine.encrypt(bytes), &unscaled)?;
        Ok(BigDecimal::new(encrypted, scale))
    }

    fn decrypt(&self, encrypted_message: &BigDecimal) -> Result<BigDecimal> {
        let engine = self.engine()?;
        let (unscaled, scale) = encrypted_message.as_bigint_and_exponent();
        let decrypted = decrypt_integer(|bytes| engine.decrypt(bytes), &unscaled)?;
        Ok(BigDecimal::new(decrypted, scale))
    }
}
