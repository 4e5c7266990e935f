use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    Internal,

    /// The encryptor, digester or registry was configured incorrectly, or
    /// used in a way its lifecycle does not allow. Never transient; retrying
    /// the same call will fail the same way.
    Configuration,

    /// An encrypt, decrypt or digest operation could not be completed on the
    /// given input.
    Operation,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Algorithm name unknown to both the static table and the provider.
    UnsupportedAlgorithm,
    /// A configuration value is out of range or cannot be parsed.
    InvalidParameter,
    /// An operation was invoked before a password was set.
    PasswordNotSet,
    /// A fixed generator was asked for more bytes than it holds.
    GeneratorExhausted,
    /// A setter was invoked after the first operation locked the configuration.
    AlreadyInitialized,
    /// The password was read back after key derivation consumed it.
    PasswordAlreadyCleaned,
    /// No instance is registered under the requested name.
    NameNotFound,
    /// Encryption, decryption or digesting failed. Deliberately does not say why.
    OperationNotPossible,
    /// The operating system random source failed.
    RandomnessUnavailable,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PbeError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PbeError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for a configuration error tagged with `kind`.
    pub fn configuration(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::Configuration, kind, msg)
    }

    /// The one error every failed encrypt/decrypt/digest turns into.
    ///
    /// Carries no source and a fixed message so that callers cannot tell a
    /// wrong password from corrupted input.
    pub fn operation_not_possible() -> Self {
        Self::with_kind(
            ErrorCategory::Operation,
            ErrorKind::OperationNotPossible,
            "encryption operation not possible",
        )
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PbeError>;
