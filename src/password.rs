//! Password buffers and password sources

use crate::error::{ErrorCategory, ErrorKind, PbeError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Owned password buffer with an explicit destructive lifecycle.
///
/// The buffer starts empty, holds a password once set, and turns into a
/// tombstone when [`SecretBuffer::consume`] hands the bytes over to key
/// derivation. The bytes are zeroed whenever they are dropped or replaced.
#[derive(Default)]
pub struct SecretBuffer {
    state: SecretState,
}

#[derive(Default)]
enum SecretState {
    #[default]
    Empty,
    Set(Zeroizing<Vec<u8>>),
    Cleared,
}

impl SecretBuffer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            state: SecretState::Set(Zeroizing::new(secret.into())),
        }
    }

    /// Replaces the held secret. The previous one, if any, is zeroed.
    pub fn set(&mut self, secret: Zeroizing<Vec<u8>>) {
        self.state = SecretState::Set(secret);
    }

    /// Whether a password was ever provided, even if it has since been consumed.
    pub fn is_set(&self) -> bool {
        !matches!(self.state, SecretState::Empty)
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self.state, SecretState::Cleared)
    }

    /// Borrows the password bytes.
    pub fn expose(&self) -> Result<&[u8]> {
        match &self.state {
            SecretState::Set(secret) => Ok(secret.as_slice()),
            other => Err(other.unavailable()),
        }
    }

    /// Takes the password bytes out and leaves the cleared tombstone behind.
    pub fn consume(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match std::mem::replace(&mut self.state, SecretState::Cleared) {
            SecretState::Set(secret) => Ok(secret),
            previous => {
                let err = previous.unavailable();
                self.state = previous;
                Err(err)
            }
        }
    }
}

impl SecretState {
    fn unavailable(&self) -> PbeError {
        match self {
            SecretState::Cleared => PbeError::configuration(
                ErrorKind::PasswordAlreadyCleaned,
                "password already cleaned: it was consumed by key derivation",
            ),
            _ => PbeError::configuration(ErrorKind::PasswordNotSet, "password not set"),
        }
    }
}

impl std::fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            SecretState::Empty => "empty",
            SecretState::Set(_) => "set",
            SecretState::Cleared => "cleared",
        };
        f.debug_struct("SecretBuffer").field("state", &state).finish()
    }
}

/// Trait for reading passwords from various sources
pub trait PasswordSource {
    /// Read a password as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the password wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password
pub struct ConstantPasswordSource {
    password: Zeroizing<Vec<u8>>,
}

impl ConstantPasswordSource {
    pub fn new(password: Vec<u8>) -> Self {
        Self {
            password: Zeroizing::new(password),
        }
    }
}

impl PasswordSource for ConstantPasswordSource {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.password).clone()))
    }
}

/// Reads a password from any io::Read source, e.g. a secrets file
pub struct ReaderPasswordSource {
    reader: Box<dyn Read>,
}

impl ReaderPasswordSource {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PasswordSource for ReaderPasswordSource {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            PbeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordNotSet,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads a password from a named environment variable
pub struct EnvPasswordSource {
    variable: String,
}

impl EnvPasswordSource {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl PasswordSource for EnvPasswordSource {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match std::env::var_os(&self.variable) {
            Some(value) => Ok(Zeroizing::new(value.into_encoded_bytes())),
            None => Err(PbeError::configuration(
                ErrorKind::PasswordNotSet,
                format!("environment variable {} is not set", self.variable),
            )),
        }
    }
}

/// Reads a password from terminal with no echo
pub struct TerminalPasswordSource {
    prompt: String,
}

impl TerminalPasswordSource {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for TerminalPasswordSource {
    fn default() -> Self {
        Self::new("Password: ")
    }
}

impl PasswordSource for TerminalPasswordSource {
    /// Read password from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(PbeError::configuration(
                ErrorKind::PasswordNotSet,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(self.prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                PbeError::with_source(
                    ErrorCategory::Internal,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword returns String (UTF-8 only), not zeroized
        let password = rpassword::read_password().map_err(|e| {
            PbeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordNotSet,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(password.into_bytes()))
    }
}

/// Wraps another PasswordSource and caches the result
///
/// Provides "at most once" semantics - the upstream source is called
/// only on the first successful invocation, and subsequent calls return the
/// cached value. Useful when several encryptors are configured from one prompt.
pub struct CachingPasswordSource {
    upstream: Box<dyn PasswordSource>,
    cached: Option<Zeroizing<Vec<u8>>>,
}

impl CachingPasswordSource {
    pub fn new(upstream: Box<dyn PasswordSource>) -> Self {
        Self {
            upstream,
            cached: None,
        }
    }
}

impl PasswordSource for CachingPasswordSource {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let cached = match self.cached.take() {
            Some(cached) => cached,
            None => self.upstream.read_password()?,
        };
        let password = Zeroizing::new((*cached).clone());
        self.cached = Some(cached);
        Ok(password)
    }
}
