//! Named instances, so configuration that only carries strings can refer to
//! fully configured encryptors and digesters.
//!
//! Each kind of instance lives in its own [`Namespace`]; a string encryptor
//! and a byte digester may share a name without colliding.

use crate::digester::Digester;
use crate::encryptor::Encryptor;
use crate::error::{ErrorKind, PbeError, Result};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

pub struct Namespace<T: ?Sized> {
    kind: &'static str,
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Namespace<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Binds `name` to `instance`, replacing whatever was bound to `name`.
    ///
    /// An instance has at most one name: if it was registered under another
    /// name, that binding is removed.
    pub fn register(&self, name: impl Into<String>, instance: Arc<T>) {
        let name = name.into();
        let mut entries = self.lock();

        let previous_names: Vec<String> = entries
            .iter()
            .filter(|(existing, bound)| **existing != name && same_instance(bound, &instance))
            .map(|(existing, _)| existing.clone())
            .collect();
        for previous in previous_names {
            entries.remove(&previous);
            tracing::debug!(kind = self.kind, from = %previous, to = %name, "instance renamed");
        }

        if entries.insert(name.clone(), instance).is_some() {
            tracing::debug!(kind = self.kind, %name, "registration replaced");
        } else {
            tracing::debug!(kind = self.kind, %name, "instance registered");
        }
    }

    /// Removes the binding for `name`, returning the instance if there was one.
    pub fn unregister(&self, name: &str) -> Option<Arc<T>> {
        let removed = self.lock().remove(name);
        if removed.is_some() {
            tracing::debug!(kind = self.kind, name, "instance unregistered");
        }
        removed
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<T>> {
        self.lock().get(name).cloned()
    }

    /// Like [`Namespace::lookup`], but absence is a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<T>> {
        self.lookup(name).ok_or_else(|| {
            PbeError::configuration(
                ErrorKind::NameNotFound,
                format!("no {} registered with name {:?}", self.kind, name),
            )
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Compares data pointers only; vtable pointers of the same object may differ.
fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub type StringEncryptorNamespace = Namespace<dyn Encryptor<Message = str>>;
pub type ByteEncryptorNamespace = Namespace<dyn Encryptor<Message = [u8]>>;
pub type BigIntegerEncryptorNamespace = Namespace<dyn Encryptor<Message = BigInt>>;
pub type BigDecimalEncryptorNamespace = Namespace<dyn Encryptor<Message = BigDecimal>>;
pub type ByteDigesterNamespace = Namespace<dyn Digester<Message = [u8]>>;
pub type StringDigesterNamespace = Namespace<dyn Digester<Message = str>>;

/// One namespace per instance kind.
///
/// Construct a `Registry` and pass it where it is needed, or share the
/// process-wide one from [`Registry::global`].
pub struct Registry {
    pub string_encryptors: StringEncryptorNamespace,
    pub byte_encryptors: ByteEncryptorNamespace,
    pub big_integer_encryptors: BigIntegerEncryptorNamespace,
    pub big_decimal_encryptors: BigDecimalEncryptorNamespace,
    pub byte_digesters: ByteDigesterNamespace,
    pub string_digesters: StringDigesterNamespace,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            string_encryptors: Namespace::new("string encryptor"),
            byte_encryptors: Namespace::new("byte encryptor"),
            big_integer_encryptors: Namespace::new("big integer encryptor"),
            big_decimal_encryptors: Namespace::new("big decimal encryptor"),
            byte_digesters: Namespace::new("byte digester"),
            string_digesters: Namespace::new("string digester"),
        }
    }

    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
