//! Textual encodings for string encryptors and digesters
//!
//! Two encodings are supported:
//! - `base64`: standard alphabet with padding (the default)
//! - `hexadecimal`: upper-case on output, either case accepted on input

use crate::error::{ErrorKind, PbeError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub enum StringOutputType {
    #[default]
    Base64,
    Hexadecimal,
}

impl StringOutputType {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            StringOutputType::Base64 => STANDARD.encode(bytes),
            StringOutputType::Hexadecimal => hex::encode_upper(bytes),
        }
    }

    /// Decodes `text`. Failures are reported as `OperationNotPossible`
    /// since the text is always untrusted operation input.
    pub fn decode(self, text: &str) -> Result<Vec<u8>> {
        let decoded = match self {
            StringOutputType::Base64 => STANDARD.decode(text.trim()).ok(),
            StringOutputType::Hexadecimal => hex::decode(text.trim()).ok(),
        };
        decoded.ok_or_else(PbeError::operation_not_possible)
    }
}

impl fmt::Display for StringOutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringOutputType::Base64 => f.write_str("base64"),
            StringOutputType::Hexadecimal => f.write_str("hexadecimal"),
        }
    }
}

impl FromStr for StringOutputType {
    type Err = PbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(StringOutputType::Base64),
            "hexadecimal" => Ok(StringOutputType::Hexadecimal),
            other => Err(PbeError::configuration(
                ErrorKind::InvalidParameter,
                format!(
                    "unknown string output type {:?}; expected \"base64\" or \"hexadecimal\"",
                    other
                ),
            )),
        }
    }
}

impl TryFrom<String> for StringOutputType {
    type Error = PbeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
