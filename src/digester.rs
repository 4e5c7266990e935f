//! Salted, iterated digests
//!
//! The digest message layout is `[salt][hash]`, or `[hash][salt]` when the
//! salt position in the output is inverted. The salt is left out when the
//! salt size is zero or the salt generator does not embed its output. The
//! hash is `H(salt || message)` (or `H(message || salt)`), re-hashed
//! `iterations - 1` more times.

use crate::algorithm::{AlgorithmCatalog, DEFAULT_DIGEST_ALGORITHM};
use crate::codec::StringOutputType;
use crate::config::DigesterConfig;
use crate::encryptor::{ProviderSetting, normalize, positive_iterations};
use crate::error::{ErrorKind, PbeError, Result};
use crate::generator::{RandomGenerator, RandomnessGenerator, generate_exact};
use crate::lifecycle::Lifecycle;
use crate::provider::{DigestAlgorithm, Provider};
use std::marker::PhantomData;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Default number of hash rounds
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// Default salt size in bytes
pub const DEFAULT_SALT_SIZE_BYTES: usize = 8;

/// One-way digesting of values of type `Message`, with verification.
pub trait Digester: Send + Sync {
    type Message: ?Sized + ToOwned;

    fn digest(&self, message: &Self::Message) -> Result<<Self::Message as ToOwned>::Owned>;

    /// Whether `digest` was produced from `message`. Malformed digests are a
    /// mismatch, not an error.
    fn matches(&self, message: &Self::Message, digest: &Self::Message) -> Result<bool>;
}

#[derive(Debug)]
struct Settings {
    algorithm: String,
    provider: ProviderSetting,
    iterations: u32,
    salt_size: usize,
    salt_generator: Arc<dyn RandomnessGenerator>,
    invert_salt_before_digesting: bool,
    invert_salt_in_output: bool,
    output_type: StringOutputType,
    normalization_ignored: bool,
    prefix: Option<String>,
    suffix: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_DIGEST_ALGORITHM.to_string(),
            provider: ProviderSetting::Default,
            iterations: DEFAULT_ITERATIONS,
            salt_size: DEFAULT_SALT_SIZE_BYTES,
            salt_generator: Arc::new(RandomGenerator),
            invert_salt_before_digesting: false,
            invert_salt_in_output: false,
            output_type: StringOutputType::default(),
            normalization_ignored: false,
            prefix: None,
            suffix: None,
        }
    }
}

pub(crate) struct DigestEngine {
    algorithm: DigestAlgorithm,
    iterations: u32,
    salt_size: usize,
    salt_generator: Arc<dyn RandomnessGenerator>,
    invert_salt_before_digesting: bool,
    invert_salt_in_output: bool,
    output_type: StringOutputType,
    normalization_ignored: bool,
    prefix: String,
    suffix: String,
}

impl DigestEngine {
    fn build(settings: &mut Settings) -> Result<Self> {
        let iterations = positive_iterations(settings.iterations)?;
        let provider = settings.provider.resolve()?;
        let canonical = AlgorithmCatalog::canonical_name(&settings.algorithm);
        let algorithm = provider.digest_algorithm(&canonical).ok_or_else(|| {
            PbeError::configuration(
                ErrorKind::UnsupportedAlgorithm,
                format!(
                    "digest algorithm {} is not supported by provider {}",
                    canonical,
                    provider.name()
                ),
            )
        })?;
        if settings.salt_size > 0 && settings.salt_generator.is_deterministic() {
            generate_exact(settings.salt_generator.as_ref(), settings.salt_size, "salt")?;
        }

        tracing::debug!(
            algorithm = algorithm.name(),
            provider = provider.name(),
            iterations,
            salt_size = settings.salt_size,
            "digester initialized"
        );

        Ok(Self {
            algorithm,
            iterations,
            salt_size: settings.salt_size,
            salt_generator: Arc::clone(&settings.salt_generator),
            invert_salt_before_digesting: settings.invert_salt_before_digesting,
            invert_salt_in_output: settings.invert_salt_in_output,
            output_type: settings.output_type,
            normalization_ignored: settings.normalization_ignored,
            prefix: settings.prefix.clone().unwrap_or_default(),
            suffix: settings.suffix.clone().unwrap_or_default(),
        })
    }

    fn salt_in_output(&self) -> bool {
        self.salt_size > 0 && self.salt_generator.include_in_output()
    }

    fn hash(&self, salt: &[u8], message: &[u8]) -> Vec<u8> {
        let mut digest = if self.invert_salt_before_digesting {
            self.algorithm.hash(&[message, salt])
        } else {
            self.algorithm.hash(&[salt, message])
        };
        for _ in 1..self.iterations {
            digest = self.algorithm.hash(&[digest.as_slice()]);
        }
        digest
    }

    fn salt(&self) -> Result<Vec<u8>> {
        if self.salt_size == 0 {
            return Ok(Vec::new());
        }
        generate_exact(self.salt_generator.as_ref(), self.salt_size, "salt")
    }

    pub(crate) fn digest(&self, message: &[u8]) -> Result<Vec<u8>> {
        let salt = self.salt()?;
        let hash = self.hash(&salt, message);
        if !self.salt_in_output() {
            return Ok(hash);
        }

        let mut output = Vec::with_capacity(salt.len() + hash.len());
        if self.invert_salt_in_output {
            output.extend_from_slice(&hash);
            output.extend_from_slice(&salt);
        } else {
            output.extend_from_slice(&salt);
            output.extend_from_slice(&hash);
        }
        Ok(output)
    }

    pub(crate) fn matches(&self, message: &[u8], digest: &[u8]) -> Result<bool> {
        let (salt, expected) = if self.salt_in_output() {
            if digest.len() < self.salt_size {
                return Ok(false);
            }
            if self.invert_salt_in_output {
                let (hash, salt) = digest.split_at(digest.len() - self.salt_size);
                (salt.to_vec(), hash)
            } else {
                let (salt, hash) = digest.split_at(self.salt_size);
                (salt.to_vec(), hash)
            }
        } else {
            (self.salt()?, digest)
        };

        let actual = self.hash(&salt, message);
        Ok(actual.ct_eq(expected).into())
    }

    pub(crate) fn digest_str(&self, message: &str) -> Result<String> {
        let message = normalize(message, self.normalization_ignored);
        let digest = self.digest(message.as_bytes())?;
        Ok(format!(
            "{}{}{}",
            self.prefix,
            self.output_type.encode(&digest),
            self.suffix
        ))
    }

    pub(crate) fn matches_str(&self, message: &str, digest: &str) -> Result<bool> {
        let Some(encoded) = digest
            .strip_prefix(self.prefix.as_str())
            .and_then(|d| d.strip_suffix(self.suffix.as_str()))
        else {
            return Ok(false);
        };
        let Ok(digest) = self.output_type.decode(encoded) else {
            return Ok(false);
        };
        let message = normalize(message, self.normalization_ignored);
        self.matches(message.as_bytes(), &digest)
    }
}

/// Salted digester for messages of type `M`; see [`StandardByteDigester`]
/// and [`StandardStringDigester`].
pub struct StandardDigester<M: ?Sized> {
    lifecycle: Lifecycle<Settings, DigestEngine>,
    _message: PhantomData<fn(&M)>,
}

pub type StandardByteDigester = StandardDigester<[u8]>;

pub type StandardStringDigester = StandardDigester<str>;

impl<M: ?Sized> Default for StandardDigester<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> StandardDigester<M> {
    pub fn new() -> Self {
        Self::from_settings(Settings::default())
    }

    /// Unsalted single-round digester, equivalent to calling the hash
    /// function directly.
    pub fn plain(algorithm: impl Into<String>) -> Self {
        Self::from_settings(Settings {
            algorithm: algorithm.into(),
            iterations: 1,
            salt_size: 0,
            ..Settings::default()
        })
    }

    fn from_settings(settings: Settings) -> Self {
        Self {
            lifecycle: Lifecycle::new(settings),
            _message: PhantomData,
        }
    }

    pub fn with_config(config: DigesterConfig) -> Result<Self> {
        let digester = Self::new();
        digester.set_config(config)?;
        Ok(digester)
    }

    /// Applies every setting present in `config`; absent ones stay untouched.
    pub fn set_config(&self, config: DigesterConfig) -> Result<()> {
        if let Some(iterations) = config.iterations {
            positive_iterations(iterations)?;
        }
        let salt_generator = config
            .salt_generator
            .as_ref()
            .map(|spec| spec.build_salt())
            .transpose()?;
        self.lifecycle.configure(|settings| {
            if let Some(algorithm) = config.algorithm {
                settings.algorithm = algorithm;
            }
            if let Some(name) = config.provider_name {
                settings.provider = ProviderSetting::Named(name);
            }
            if let Some(iterations) = config.iterations {
                settings.iterations = iterations;
            }
            if let Some(size) = config.salt_size_bytes {
                settings.salt_size = size;
            }
            if let Some(generator) = salt_generator {
                settings.salt_generator = generator;
            }
            if let Some(invert) = config.invert_salt_position_before_digesting {
                settings.invert_salt_before_digesting = invert;
            }
            if let Some(invert) = config.invert_salt_position_in_output {
                settings.invert_salt_in_output = invert;
            }
            if let Some(output_type) = config.string_output_type {
                settings.output_type = output_type;
            }
            if let Some(ignored) = config.unicode_normalization_ignored {
                settings.normalization_ignored = ignored;
            }
            if config.prefix.is_some() {
                settings.prefix = config.prefix;
            }
            if config.suffix.is_some() {
                settings.suffix = config.suffix;
            }
        })
    }

    pub fn set_algorithm(&self, algorithm: impl Into<String>) -> Result<()> {
        let algorithm = algorithm.into();
        self.lifecycle.configure(|s| s.algorithm = algorithm)
    }

    pub fn set_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        self.lifecycle
            .configure(|s| s.provider = ProviderSetting::Handle(provider))
    }

    pub fn set_provider_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.lifecycle
            .configure(|s| s.provider = ProviderSetting::Named(name))
    }

    pub fn set_iterations(&self, iterations: u32) -> Result<()> {
        self.lifecycle
            .configure(|s| positive_iterations(iterations).map(|i| s.iterations = i))?
    }

    /// Zero disables salting.
    pub fn set_salt_size_bytes(&self, size: usize) -> Result<()> {
        self.lifecycle.configure(|s| s.salt_size = size)
    }

    pub fn set_salt_generator(&self, generator: Arc<dyn RandomnessGenerator>) -> Result<()> {
        self.lifecycle.configure(|s| s.salt_generator = generator)
    }

    pub fn set_invert_salt_position_before_digesting(&self, invert: bool) -> Result<()> {
        self.lifecycle
            .configure(|s| s.invert_salt_before_digesting = invert)
    }

    pub fn set_invert_salt_position_in_output(&self, invert: bool) -> Result<()> {
        self.lifecycle.configure(|s| s.invert_salt_in_output = invert)
    }

    pub fn set_string_output_type(&self, output_type: StringOutputType) -> Result<()> {
        self.lifecycle.configure(|s| s.output_type = output_type)
    }

    pub fn set_unicode_normalization_ignored(&self, ignored: bool) -> Result<()> {
        self.lifecycle
            .configure(|s| s.normalization_ignored = ignored)
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        self.lifecycle.configure(|s| s.prefix = Some(prefix))
    }

    pub fn set_suffix(&self, suffix: impl Into<String>) -> Result<()> {
        let suffix = suffix.into();
        self.lifecycle.configure(|s| s.suffix = Some(suffix))
    }

    pub fn initialize(&self) -> Result<()> {
        self.engine().map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_locked()
    }

    fn engine(&self) -> Result<Arc<DigestEngine>> {
        self.lifecycle.engine(DigestEngine::build)
    }
}

impl<M: ?Sized> std::fmt::Debug for StandardDigester<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let algorithm = self.lifecycle.inspect(|s| s.algorithm.clone());
        f.debug_struct("StandardDigester")
            .field("algorithm", &algorithm)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Digester for StandardDigester<[u8]> {
    type Message = [u8];

    fn digest(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.engine()?.digest(message)
    }

    fn matches(&self, message: &[u8], digest: &[u8]) -> Result<bool> {
        self.engine()?.matches(message, digest)
    }
}

impl Digester for StandardDigester<str> {
    type Message = str;

    fn digest(&self, message: &str) -> Result<String> {
        self.engine()?.digest_str(message)
    }

    fn matches(&self, message: &str, digest: &str) -> Result<bool> {
        self.engine()?.matches_str(message, digest)
    }
}
