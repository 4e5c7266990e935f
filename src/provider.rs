//! Cryptographic providers and the primitives they supply
//!
//! A provider maps algorithm names onto concrete key derivation, AEAD cipher
//! and hash primitives. The engine never implements primitives itself; it
//! only asks a provider for them. [`RustCryptoProvider`] is the default and
//! composes the RustCrypto crates:
//! - PBKDF2-HMAC-SHA256/512 and scrypt for key derivation
//! - XSalsa20Poly1305, ChaCha20Poly1305 and AES-256-GCM for encryption
//! - SHA-2 for digests

use crate::error::{ErrorKind, PbeError, Result};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use scrypt::{Params, scrypt};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Length of every derived cipher key in bytes
pub const KEY_LEN: usize = 32;

/// scrypt N parameter (CPU/memory cost)
const SCRYPT_N: u32 = 32768;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Salt size of algorithms whose salt size is decided by the provider
const PROVIDER_SALT_LEN: usize = 16;

/// Name the default provider answers to.
pub const DEFAULT_PROVIDER_NAME: &str = "RustCrypto";

/// Supplies PBE and digest primitives by algorithm name.
///
/// Names are matched case-insensitively by the caller, which passes them in
/// upper case.
pub trait Provider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn pbe_algorithm(&self, name: &str) -> Option<PbeAlgorithm>;

    fn digest_algorithm(&self, name: &str) -> Option<DigestAlgorithm>;
}

/// Resolves a provider by its registered name.
pub fn provider_by_name(name: &str) -> Result<Arc<dyn Provider>> {
    if name.eq_ignore_ascii_case(DEFAULT_PROVIDER_NAME) {
        Ok(default_provider())
    } else {
        Err(PbeError::configuration(
            ErrorKind::InvalidParameter,
            format!("unknown security provider: {}", name),
        ))
    }
}

pub fn default_provider() -> Arc<dyn Provider> {
    Arc::new(RustCryptoProvider)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

const PBE_ALGORITHMS: &[PbeAlgorithm] = &[
    PbeAlgorithm {
        name: "PBEWITHHMACSHA256ANDXSALSA20POLY1305",
        kdf: Kdf::Pbkdf2HmacSha256,
        cipher: AeadCipher::XSalsa20Poly1305,
        iv: IvSource::Derived,
        salt_len: 8,
    },
    PbeAlgorithm {
        name: "PBEWITHSCRYPTANDXSALSA20POLY1305",
        kdf: Kdf::Scrypt,
        cipher: AeadCipher::XSalsa20Poly1305,
        iv: IvSource::Derived,
        salt_len: 8,
    },
    PbeAlgorithm {
        name: "PBEWITHHMACSHA512ANDCHACHA20POLY1305",
        kdf: Kdf::Pbkdf2HmacSha512,
        cipher: AeadCipher::ChaCha20Poly1305,
        iv: IvSource::Derived,
        salt_len: 8,
    },
    PbeAlgorithm {
        name: "PBEWITHHMACSHA256ANDAES_256GCM",
        kdf: Kdf::Pbkdf2HmacSha256,
        cipher: AeadCipher::Aes256Gcm,
        iv: IvSource::Explicit,
        salt_len: PROVIDER_SALT_LEN,
    },
    PbeAlgorithm {
        name: "PBEWITHHMACSHA512ANDAES_256GCM",
        kdf: Kdf::Pbkdf2HmacSha512,
        cipher: AeadCipher::Aes256Gcm,
        iv: IvSource::Explicit,
        salt_len: PROVIDER_SALT_LEN,
    },
];

impl Provider for RustCryptoProvider {
    fn name(&self) -> &str {
        DEFAULT_PROVIDER_NAME
    }

    fn pbe_algorithm(&self, name: &str) -> Option<PbeAlgorithm> {
        PBE_ALGORITHMS.iter().find(|a| a.name == name).copied()
    }

    fn digest_algorithm(&self, name: &str) -> Option<DigestAlgorithm> {
        match name {
            "SHA-224" => Some(DigestAlgorithm::Sha224),
            "SHA-256" => Some(DigestAlgorithm::Sha256),
            "SHA-384" => Some(DigestAlgorithm::Sha384),
            "SHA-512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    Pbkdf2HmacSha256,
    Pbkdf2HmacSha512,
    /// Fixed cost parameters; the configured iteration count is not used.
    Scrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadCipher {
    XSalsa20Poly1305,
    ChaCha20Poly1305,
    Aes256Gcm,
}

impl AeadCipher {
    pub fn nonce_len(self) -> usize {
        match self {
            AeadCipher::XSalsa20Poly1305 => 24,
            AeadCipher::ChaCha20Poly1305 | AeadCipher::Aes256Gcm => 12,
        }
    }
}

/// Where an algorithm's IV comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvSource {
    /// Derived together with the key from (password, salt, iterations);
    /// never stored in the message.
    Derived,
    /// Produced by the configured IV generator.
    Explicit,
}

/// A password-based encryption scheme: one KDF paired with one AEAD cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PbeAlgorithm {
    name: &'static str,
    kdf: Kdf,
    cipher: AeadCipher,
    iv: IvSource,
    salt_len: usize,
}

/// Cipher key (and, for derived-IV algorithms, the nonce) bound to one salt.
pub struct CipherKey {
    key: Zeroizing<[u8; KEY_LEN]>,
    derived_nonce: Zeroizing<Vec<u8>>,
}

impl PbeAlgorithm {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kdf(&self) -> Kdf {
        self.kdf
    }

    pub fn cipher(&self) -> AeadCipher {
        self.cipher
    }

    pub fn iv_source(&self) -> IvSource {
        self.iv
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Bytes the IV generator has to supply for one operation.
    pub fn iv_len(&self) -> usize {
        match self.iv {
            IvSource::Derived => 0,
            IvSource::Explicit => self.cipher.nonce_len(),
        }
    }

    pub fn derive_key(&self, password: &[u8], salt: &[u8], iterations: u32) -> Result<CipherKey> {
        let derived_len = match self.iv {
            IvSource::Derived => KEY_LEN + self.cipher.nonce_len(),
            IvSource::Explicit => KEY_LEN,
        };
        let mut output = Zeroizing::new(vec![0u8; derived_len]);
        match self.kdf {
            Kdf::Pbkdf2HmacSha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output[..])
            }
            Kdf::Pbkdf2HmacSha512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut output[..])
            }
            Kdf::Scrypt => {
                let params = Params::new(
                    SCRYPT_N.ilog2() as u8, // log_n
                    SCRYPT_R,
                    SCRYPT_P,
                    KEY_LEN,
                )
                .map_err(|_| PbeError::operation_not_possible())?;
                scrypt(password, salt, &params, &mut output[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
            }
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&output[..KEY_LEN]);
        Ok(CipherKey {
            key,
            derived_nonce: Zeroizing::new(output[KEY_LEN..].to_vec()),
        })
    }

    pub fn seal(&self, key: &CipherKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(key, iv)?;
        match self.cipher {
            AeadCipher::XSalsa20Poly1305 => {
                let cipher = XSalsa20Poly1305::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.encrypt(GenericArray::from_slice(nonce), plaintext)
            }
            AeadCipher::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.encrypt(GenericArray::from_slice(nonce), plaintext)
            }
            AeadCipher::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.encrypt(GenericArray::from_slice(nonce), plaintext)
            }
        }
        .map_err(|_| PbeError::operation_not_possible())
    }

    pub fn open(&self, key: &CipherKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.nonce(key, iv)?;
        match self.cipher {
            AeadCipher::XSalsa20Poly1305 => {
                let cipher = XSalsa20Poly1305::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.decrypt(GenericArray::from_slice(nonce), ciphertext)
            }
            AeadCipher::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.decrypt(GenericArray::from_slice(nonce), ciphertext)
            }
            AeadCipher::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&key.key[..])
                    .map_err(|_| PbeError::operation_not_possible())?;
                cipher.decrypt(GenericArray::from_slice(nonce), ciphertext)
            }
        }
        .map_err(|_| PbeError::operation_not_possible())
    }

    fn nonce<'a>(&self, key: &'a CipherKey, iv: &'a [u8]) -> Result<&'a [u8]> {
        let nonce = match self.iv {
            IvSource::Derived => &key.derived_nonce[..],
            IvSource::Explicit => iv,
        };
        if nonce.len() != self.cipher.nonce_len() {
            return Err(PbeError::operation_not_possible());
        }
        Ok(nonce)
    }
}

/// Hash functions available for digesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha224 => "SHA-224",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha224 => 28,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Hashes the concatenation of `parts`.
    pub fn hash(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(*part);
            }
            hasher.finalize().to_vec()
        }

        match self {
            DigestAlgorithm::Sha224 => run::<Sha224>(parts),
            DigestAlgorithm::Sha256 => run::<Sha256>(parts),
            DigestAlgorithm::Sha384 => run::<Sha384>(parts),
            DigestAlgorithm::Sha512 => run::<Sha512>(parts),
        }
    }
}
