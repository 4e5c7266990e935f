//! Salt and IV generation strategies
//!
//! Every generator reports two capabilities alongside its bytes:
//! - `include_in_output`: whether the bytes must travel with the encrypted or
//!   digested message, because the receiving side cannot regenerate them.
//! - `is_deterministic`: whether every call returns the same bytes, which lets
//!   encryptors derive their cipher key once instead of per operation.

use crate::error::{ErrorCategory, ErrorKind, PbeError, Result};
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A source of salt or IV bytes.
pub trait RandomnessGenerator: Send + Sync + fmt::Debug {
    /// Produce exactly `len` bytes.
    fn generate(&self, len: usize) -> Result<Vec<u8>>;

    /// Whether the generated bytes are embedded in the assembled message.
    fn include_in_output(&self) -> bool;

    /// Whether every call yields the same bytes.
    fn is_deterministic(&self) -> bool;
}

/// Fresh bytes from the operating system CSPRNG on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGenerator;

impl RandomnessGenerator for RandomGenerator {
    fn generate(&self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            PbeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomnessUnavailable,
                format!("operating system random source failed: {}", e),
                e,
            )
        })?;
        Ok(bytes)
    }

    fn include_in_output(&self) -> bool {
        true
    }

    fn is_deterministic(&self) -> bool {
        false
    }
}

/// A caller-supplied value known to both sides, returned as a prefix of the
/// requested length.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedGenerator {
    value: Vec<u8>,
}

impl FixedGenerator {
    pub fn from_bytes(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Uses the UTF-8 bytes of `value`.
    pub fn from_string(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let value = hex::decode(value).map_err(|e| {
            PbeError::with_kind_and_source(
                ErrorCategory::Configuration,
                ErrorKind::InvalidParameter,
                format!("fixed generator value is not valid hexadecimal: {}", e),
                e,
            )
        })?;
        Ok(Self::from_bytes(value))
    }
}

impl fmt::Debug for FixedGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedGenerator")
            .field("len", &self.value.len())
            .finish()
    }
}

impl RandomnessGenerator for FixedGenerator {
    fn generate(&self, len: usize) -> Result<Vec<u8>> {
        match self.value.get(..len) {
            Some(prefix) => Ok(prefix.to_vec()),
            None => Err(PbeError::configuration(
                ErrorKind::GeneratorExhausted,
                format!(
                    "requested {} bytes from a fixed generator holding only {}",
                    len,
                    self.value.len()
                ),
            )),
        }
    }

    fn include_in_output(&self) -> bool {
        false
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// All-zero bytes of any length. Meant for reproducible test vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroGenerator;

impl RandomnessGenerator for ZeroGenerator {
    fn generate(&self, len: usize) -> Result<Vec<u8>> {
        Ok(vec![0u8; len])
    }

    fn include_in_output(&self) -> bool {
        false
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// For algorithms that derive their IV from the key schedule: always empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIvGenerator;

impl RandomnessGenerator for NoIvGenerator {
    fn generate(&self, _len: usize) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn include_in_output(&self) -> bool {
        false
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Textual generator selection, as found in configuration files.
///
/// Accepted identifiers: `random`, `zero`, `none`, `fixed:<text>` and
/// `fixed-hex:<hex>`.
#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub enum GeneratorSpec {
    Random,
    Zero,
    NoIv,
    Fixed(Vec<u8>),
}

impl GeneratorSpec {
    pub fn build(&self) -> Arc<dyn RandomnessGenerator> {
        match self {
            GeneratorSpec::Random => Arc::new(RandomGenerator),
            GeneratorSpec::Zero => Arc::new(ZeroGenerator),
            GeneratorSpec::NoIv => Arc::new(NoIvGenerator),
            GeneratorSpec::Fixed(value) => Arc::new(FixedGenerator::from_bytes(value.clone())),
        }
    }

    /// Like [`GeneratorSpec::build`], for salts. `none` is rejected: every
    /// salt has the length its algorithm mandates.
    pub fn build_salt(&self) -> Result<Arc<dyn RandomnessGenerator>> {
        if *self == GeneratorSpec::NoIv {
            return Err(PbeError::configuration(
                ErrorKind::InvalidParameter,
                "\"none\" is an IV generator and cannot produce salts",
            ));
        }
        Ok(self.build())
    }
}

/// Generates `len` bytes and fails with `InvalidParameter` if the generator
/// returns any other length.
pub(crate) fn generate_exact(
    generator: &dyn RandomnessGenerator,
    len: usize,
    purpose: &str,
) -> Result<Vec<u8>> {
    let bytes = generator.generate(len)?;
    if bytes.len() != len {
        return Err(PbeError::configuration(
            ErrorKind::InvalidParameter,
            format!(
                "{} generator returned {} bytes, {} required",
                purpose,
                bytes.len(),
                len
            ),
        ));
    }
    Ok(bytes)
}

impl fmt::Debug for GeneratorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorSpec::Random => f.write_str("Random"),
            GeneratorSpec::Zero => f.write_str("Zero"),
            GeneratorSpec::NoIv => f.write_str("NoIv"),
            GeneratorSpec::Fixed(value) => write!(f, "Fixed({} bytes)", value.len()),
        }
    }
}

impl FromStr for GeneratorSpec {
    type Err = PbeError;

    /// The identifier before `:` is trimmed and case-insensitive; a `fixed:`
    /// payload is taken byte for byte.
    fn from_str(s: &str) -> Result<Self> {
        if let Some((identifier, payload)) = s.split_once(':') {
            return match identifier.trim().to_ascii_lowercase().as_str() {
                "fixed" => Ok(GeneratorSpec::Fixed(payload.as_bytes().to_vec())),
                "fixed-hex" => Ok(GeneratorSpec::Fixed(
                    FixedGenerator::from_hex(payload.trim())?.value,
                )),
                other => Err(unknown_identifier(other)),
            };
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(GeneratorSpec::Random),
            "zero" => Ok(GeneratorSpec::Zero),
            "none" => Ok(GeneratorSpec::NoIv),
            other => Err(unknown_identifier(other)),
        }
    }
}

fn unknown_identifier(identifier: &str) -> PbeError {
    PbeError::configuration(
        ErrorKind::InvalidParameter,
        format!("unknown salt/IV generator identifier: {:?}", identifier),
    )
}

impl TryFrom<String> for GeneratorSpec {
    type Error = PbeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
