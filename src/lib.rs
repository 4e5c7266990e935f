//! pbecrypt - Password-based encryption and salted digests
//!
//! Encryptors for bytes, strings and arbitrary-precision numbers, salted
//! digesters, a registry of named instances and the `ENC(...)` convention
//! for marking encrypted values in configuration text.
//!
//! Encryptors and digesters are configured through setters or a config
//! value, and lock their configuration on first use:
//!
//! ```
//! use pbecrypt::{Encryptor, StandardPbeStringEncryptor};
//!
//! let encryptor = StandardPbeStringEncryptor::new();
//! encryptor.set_password("correct horse").unwrap();
//! let encrypted = encryptor.encrypt("Hello World!").unwrap();
//! assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "Hello World!");
//! assert!(encryptor.set_password("too late").is_err());
//! ```

#![forbid(unsafe_code)]

pub mod algorithm;
pub mod codec;
pub mod config;
pub mod delimited;
pub mod digester;
pub mod encryptor;
pub mod error;
pub mod generator;
mod lifecycle;
pub mod numeric;
pub mod password;
pub mod provider;
pub mod registry;

pub use algorithm::AlgorithmCatalog;
pub use codec::StringOutputType;
pub use config::{DigesterConfig, EncryptorConfig};
pub use delimited::{Delimiters, EncryptableProperties};
pub use digester::{Digester, StandardByteDigester, StandardDigester, StandardStringDigester};
pub use encryptor::{
    Encryptor, StandardPbeByteEncryptor, StandardPbeEncryptor, StandardPbeStringEncryptor,
};
pub use error::{ErrorCategory, ErrorKind, PbeError, Result};
pub use generator::{
    FixedGenerator, GeneratorSpec, NoIvGenerator, RandomGenerator, RandomnessGenerator,
    ZeroGenerator,
};
pub use numeric::{StandardPbeBigDecimalEncryptor, StandardPbeBigIntegerEncryptor};
pub use password::{PasswordSource, SecretBuffer};
pub use provider::{Provider, RustCryptoProvider};
pub use registry::Registry;
