//! Marking encrypted values inside plaintext documents
//!
//! A value such as `ENC(3q2+7w==)` is ciphertext; anything else is taken
//! literally. This lets a properties file or YAML document mix plain and
//! encrypted values and have them resolved in one pass.

use crate::encryptor::Encryptor;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_PREFIX: &str = "ENC(";
pub const DEFAULT_SUFFIX: &str = ")";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    prefix: String,
    suffix: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX)
    }
}

impl Delimiters {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether the trimmed value starts with the prefix and ends with the
    /// suffix.
    pub fn is_marked(&self, value: &str) -> bool {
        self.unwrap(value).is_some()
    }

    pub fn wrap(&self, ciphertext: &str) -> String {
        format!("{}{}{}", self.prefix, ciphertext, self.suffix)
    }

    /// Text between the delimiters, or `None` if the value is not marked.
    pub fn unwrap<'a>(&self, value: &'a str) -> Option<&'a str> {
        let value = value.trim();
        if value.len() < self.prefix.len() + self.suffix.len() {
            return None;
        }
        value
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
    }

    /// Decrypts a marked value; an unmarked value is returned unchanged.
    pub fn resolve<E>(&self, value: &str, encryptor: &E) -> Result<String>
    where
        E: Encryptor<Message = str> + ?Sized,
    {
        match self.unwrap(value) {
            Some(ciphertext) => encryptor.decrypt(ciphertext),
            None => Ok(value.to_string()),
        }
    }

    /// Encrypts `plaintext` and marks the result.
    pub fn encrypt_value<E>(&self, plaintext: &str, encryptor: &E) -> Result<String>
    where
        E: Encryptor<Message = str> + ?Sized,
    {
        Ok(self.wrap(&encryptor.encrypt(plaintext)?))
    }

    /// Decrypts every marked span inside `text`.
    ///
    /// A prefix without a matching suffix is left as it is.
    pub fn resolve_embedded<E>(&self, text: &str, encryptor: &E) -> Result<String>
    where
        E: Encryptor<Message = str> + ?Sized,
    {
        if self.prefix.is_empty() || self.suffix.is_empty() {
            return self.resolve(text, encryptor);
        }

        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(self.prefix.as_str()) {
            let after_prefix = &rest[start + self.prefix.len()..];
            let Some(end) = after_prefix.find(self.suffix.as_str()) else {
                break;
            };
            output.push_str(&rest[..start]);
            output.push_str(&encryptor.decrypt(&after_prefix[..end])?);
            rest = &after_prefix[end + self.suffix.len()..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

/// Key/value properties whose marked values are decrypted on access.
pub struct EncryptableProperties {
    values: HashMap<String, String>,
    encryptor: Arc<dyn Encryptor<Message = str>>,
    delimiters: Delimiters,
}

impl EncryptableProperties {
    pub fn new(encryptor: Arc<dyn Encryptor<Message = str>>) -> Self {
        Self {
            values: HashMap::new(),
            encryptor,
            delimiters: Delimiters::default(),
        }
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// The value for `key`, decrypted if it is marked.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.values
            .get(key)
            .map(|value| self.delimiters.resolve(value, self.encryptor.as_ref()))
            .transpose()
    }

    /// The stored value for `key`, without decryption.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for EncryptableProperties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl std::fmt::Debug for EncryptableProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptableProperties")
            .field("keys", &self.values.len())
            .field("delimiters", &self.delimiters)
            .finish_non_exhaustive()
    }
}
