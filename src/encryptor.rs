//! Password-based encryptors
//!
//! [`StandardPbeEncryptor`] is configured through setters (or an
//! [`EncryptorConfig`]) and locks itself on the first operation, deriving the
//! key material exactly once. After that it can be shared freely between
//! threads.
//!
//! The encrypted message layout is:
//! - salt: algorithm-mandated length, only if the salt generator includes it
//! - IV: cipher nonce length, only for explicit-IV algorithms whose IV
//!   generator includes it
//! - ciphertext: AEAD output including the authentication tag
//!
//! There is no length header; decryption must use the same configuration
//! that produced the message.

use crate::algorithm::{AlgorithmCatalog, DEFAULT_PBE_ALGORITHM};
use crate::codec::StringOutputType;
use crate::config::EncryptorConfig;
use crate::error::{ErrorKind, PbeError, Result};
use crate::generator::{NoIvGenerator, RandomGenerator, RandomnessGenerator, generate_exact};
use crate::lifecycle::Lifecycle;
use crate::password::{PasswordSource, SecretBuffer};
use crate::provider::{self, CipherKey, IvSource, PbeAlgorithm, Provider};
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// Default key obtention iteration count
pub const DEFAULT_KEY_OBTENTION_ITERATIONS: u32 = 1000;

/// Reversible encryption of values of type `Message`.
pub trait Encryptor: Send + Sync {
    type Message: ?Sized + ToOwned;

    fn encrypt(&self, message: &Self::Message) -> Result<<Self::Message as ToOwned>::Owned>;

    fn decrypt(
        &self,
        encrypted_message: &Self::Message,
    ) -> Result<<Self::Message as ToOwned>::Owned>;
}

#[derive(Debug, Clone)]
pub(crate) enum ProviderSetting {
    Default,
    Named(String),
    Handle(Arc<dyn Provider>),
}

impl ProviderSetting {
    pub(crate) fn resolve(&self) -> Result<Arc<dyn Provider>> {
        match self {
            ProviderSetting::Default => Ok(provider::default_provider()),
            ProviderSetting::Named(name) => provider::provider_by_name(name),
            ProviderSetting::Handle(provider) => Ok(Arc::clone(provider)),
        }
    }
}

pub(crate) fn positive_iterations(iterations: u32) -> Result<u32> {
    if iterations == 0 {
        return Err(PbeError::configuration(
            ErrorKind::InvalidParameter,
            "iteration count must be greater than zero",
        ));
    }
    Ok(iterations)
}

pub(crate) fn normalize(message: &str, ignored: bool) -> Cow<'_, str> {
    if ignored {
        Cow::Borrowed(message)
    } else {
        Cow::Owned(message.nfc().collect())
    }
}

#[derive(Debug)]
struct Settings {
    algorithm: String,
    password: SecretBuffer,
    provider: ProviderSetting,
    iterations: u32,
    salt_generator: Arc<dyn RandomnessGenerator>,
    iv_generator: Option<Arc<dyn RandomnessGenerator>>,
    output_type: StringOutputType,
    normalization_ignored: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_PBE_ALGORITHM.to_string(),
            password: SecretBuffer::default(),
            provider: ProviderSetting::Default,
            iterations: DEFAULT_KEY_OBTENTION_ITERATIONS,
            salt_generator: Arc::new(RandomGenerator),
            iv_generator: None,
            output_type: StringOutputType::default(),
            normalization_ignored: false,
        }
    }
}

/// Locked, immutable state of an encryptor.
pub(crate) struct Engine {
    algorithm: PbeAlgorithm,
    password: Zeroizing<Vec<u8>>,
    iterations: u32,
    salt_len: usize,
    salt_generator: Arc<dyn RandomnessGenerator>,
    iv_generator: Arc<dyn RandomnessGenerator>,
    fixed_key: Option<CipherKey>,
    output_type: StringOutputType,
    normalization_ignored: bool,
}

impl Engine {
    fn build(settings: &mut Settings) -> Result<Self> {
        let iterations = positive_iterations(settings.iterations)?;
        let provider = settings.provider.resolve()?;
        let algorithm = AlgorithmCatalog::resolve(&settings.algorithm, provider.as_ref())?;
        let salt_len = AlgorithmCatalog::required_salt_bytes(algorithm.name(), provider.as_ref())?;
        let iv_generator = Self::iv_generator_for(&algorithm, settings.iv_generator.as_ref())?;

        let password = settings.password.expose()?;
        let password = match std::str::from_utf8(password) {
            Ok(text) if !settings.normalization_ignored => {
                Zeroizing::new(text.nfc().collect::<String>().into_bytes())
            }
            _ => Zeroizing::new(password.to_vec()),
        };

        // A deterministic salt yields the same key every time, so derive it once.
        let fixed_key = if settings.salt_generator.is_deterministic() {
            let salt = generate_exact(settings.salt_generator.as_ref(), salt_len, "salt")?;
            Some(algorithm.derive_key(&password, &salt, iterations)?)
        } else {
            None
        };

        settings.password.consume()?;

        tracing::debug!(
            algorithm = algorithm.name(),
            provider = provider.name(),
            iterations,
            salt_len,
            iv_len = algorithm.iv_len(),
            fixed_salt = fixed_key.is_some(),
            "encryptor initialized"
        );

        Ok(Self {
            algorithm,
            password,
            iterations,
            salt_len,
            salt_generator: Arc::clone(&settings.salt_generator),
            iv_generator,
            fixed_key,
            output_type: settings.output_type,
            normalization_ignored: settings.normalization_ignored,
        })
    }

    fn iv_generator_for(
        algorithm: &PbeAlgorithm,
        configured: Option<&Arc<dyn RandomnessGenerator>>,
    ) -> Result<Arc<dyn RandomnessGenerator>> {
        match (algorithm.iv_source(), configured) {
            (IvSource::Explicit, None) => Ok(Arc::new(RandomGenerator)),
            (IvSource::Explicit, Some(generator)) => {
                if generator.is_deterministic()
                    && generator.generate(algorithm.iv_len())?.len() != algorithm.iv_len()
                {
                    return Err(PbeError::configuration(
                        ErrorKind::InvalidParameter,
                        format!(
                            "algorithm {} needs a {}-byte IV but the IV generator supplies none",
                            algorithm.name(),
                            algorithm.iv_len()
                        ),
                    ));
                }
                Ok(Arc::clone(generator))
            }
            (IvSource::Derived, configured) => {
                let supplies_bytes = configured.is_some_and(|g| {
                    !g.is_deterministic() || g.generate(1).map_or(true, |b| !b.is_empty())
                });
                if supplies_bytes {
                    tracing::warn!(
                        algorithm = algorithm.name(),
                        "ignoring configured IV generator: algorithm derives its IV from the key"
                    );
                }
                Ok(Arc::new(NoIvGenerator))
            }
        }
    }

    pub(crate) fn encrypt(&self, message: &[u8]) -> Result<Vec<u8>> {
        let salt = generate_exact(self.salt_generator.as_ref(), self.salt_len, "salt")?;
        let iv = generate_exact(self.iv_generator.as_ref(), self.algorithm.iv_len(), "IV")?;

        let derived;
        let key = match &self.fixed_key {
            Some(key) => key,
            None => {
                derived = self
                    .algorithm
                    .derive_key(&self.password, &salt, self.iterations)?;
                &derived
            }
        };
        let ciphertext = self.algorithm.seal(key, &iv, message)?;

        let mut output = Vec::with_capacity(salt.len() + iv.len() + ciphertext.len());
        if self.salt_generator.include_in_output() {
            output.extend_from_slice(&salt);
        }
        if self.iv_generator.include_in_output() {
            output.extend_from_slice(&iv);
        }
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    pub(crate) fn decrypt(&self, encrypted_message: &[u8]) -> Result<Vec<u8>> {
        let mut rest = encrypted_message;
        let salt = take_or_generate(
            self.salt_generator.as_ref(),
            self.salt_len,
            "salt",
            &mut rest,
        )?;
        let iv = take_or_generate(
            self.iv_generator.as_ref(),
            self.algorithm.iv_len(),
            "IV",
            &mut rest,
        )?;

        let derived;
        let key = match &self.fixed_key {
            Some(key) => key,
            None => {
                derived = self
                    .algorithm
                    .derive_key(&self.password, &salt, self.iterations)?;
                &derived
            }
        };
        self.algorithm.open(key, &iv, rest)
    }

    pub(crate) fn encrypt_str(&self, message: &str) -> Result<String> {
        let message = normalize(message, self.normalization_ignored);
        let encrypted = self.encrypt(message.as_bytes())?;
        Ok(self.output_type.encode(&encrypted))
    }

    pub(crate) fn decrypt_str(&self, encrypted_message: &str) -> Result<String> {
        let encrypted = self.output_type.decode(encrypted_message)?;
        let message = self.decrypt(&encrypted)?;
        String::from_utf8(message).map_err(|_| PbeError::operation_not_possible())
    }
}

/// Splits `len` bytes off the front of `rest` when the generator embeds its
/// output, or regenerates them otherwise.
fn take_or_generate(
    generator: &dyn RandomnessGenerator,
    len: usize,
    purpose: &str,
    rest: &mut &[u8],
) -> Result<Vec<u8>> {
    if !generator.include_in_output() {
        return generate_exact(generator, len, purpose);
    }
    if rest.len() < len {
        return Err(PbeError::operation_not_possible());
    }
    let (taken, remaining) = rest.split_at(len);
    *rest = remaining;
    Ok(taken.to_vec())
}

/// Password-based encryptor for messages of type `M`.
///
/// Use the aliases [`StandardPbeByteEncryptor`], [`StandardPbeStringEncryptor`],
/// [`StandardPbeBigIntegerEncryptor`](crate::StandardPbeBigIntegerEncryptor) and
/// [`StandardPbeBigDecimalEncryptor`](crate::StandardPbeBigDecimalEncryptor).
pub struct StandardPbeEncryptor<M: ?Sized> {
    lifecycle: Lifecycle<Settings, Engine>,
    _message: PhantomData<fn(&M)>,
}

pub type StandardPbeByteEncryptor = StandardPbeEncryptor<[u8]>;

pub type StandardPbeStringEncryptor = StandardPbeEncryptor<str>;

impl<M: ?Sized> Default for StandardPbeEncryptor<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> StandardPbeEncryptor<M> {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(Settings::default()),
            _message: PhantomData,
        }
    }

    /// Creates an encryptor with every setting present in `config` applied.
    pub fn with_config(config: EncryptorConfig) -> Result<Self> {
        let encryptor = Self::new();
        encryptor.set_config(config)?;
        Ok(encryptor)
    }

    /// Applies every setting present in `config`; absent ones stay untouched.
    pub fn set_config(&self, config: EncryptorConfig) -> Result<()> {
        let EncryptorConfig {
            algorithm,
            mut password,
            provider_name,
            key_obtention_iterations,
            salt_generator,
            iv_generator,
            string_output_type,
            unicode_normalization_ignored,
        } = config;
        if let Some(iterations) = key_obtention_iterations {
            positive_iterations(iterations)?;
        }
        let salt_generator = salt_generator
            .map(|spec| spec.build_salt())
            .transpose()?;
        let password = if password.is_set() {
            Some(password.consume()?)
        } else {
            None
        };

        self.lifecycle.configure(|settings| {
            if let Some(algorithm) = algorithm {
                settings.algorithm = algorithm;
            }
            if let Some(password) = password {
                settings.password.set(password);
            }
            if let Some(name) = provider_name {
                settings.provider = ProviderSetting::Named(name);
            }
            if let Some(iterations) = key_obtention_iterations {
                settings.iterations = iterations;
            }
            if let Some(generator) = salt_generator {
                settings.salt_generator = generator;
            }
            if let Some(spec) = iv_generator {
                settings.iv_generator = Some(spec.build());
            }
            if let Some(output_type) = string_output_type {
                settings.output_type = output_type;
            }
            if let Some(ignored) = unicode_normalization_ignored {
                settings.normalization_ignored = ignored;
            }
        })
    }

    pub fn set_algorithm(&self, algorithm: impl Into<String>) -> Result<()> {
        let algorithm = algorithm.into();
        self.lifecycle.configure(|s| s.algorithm = algorithm)
    }

    pub fn set_password(&self, password: impl AsRef<[u8]>) -> Result<()> {
        let password = Zeroizing::new(password.as_ref().to_vec());
        self.lifecycle.configure(|s| s.password.set(password))
    }

    pub fn set_password_from(&self, source: &mut dyn PasswordSource) -> Result<()> {
        let password = source.read_password()?;
        self.lifecycle.configure(|s| s.password.set(password))
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

    pub fn set_key_obtention_iterations(&self, iterations: u32) -> Result<()> {
        self.lifecycle
            .configure(|s| positive_iterations(iterations).map(|i| s.iterations = i))?
    }

    pub fn set_salt_generator(&self, generator: Arc<dyn RandomnessGenerator>) -> Result<()> {
        self.lifecycle.configure(|s| s.salt_generator = generator)
    }

    pub fn set_iv_generator(&self, generator: Arc<dyn RandomnessGenerator>) -> Result<()> {
        self.lifecycle.configure(|s| s.iv_generator = Some(generator))
    }

    pub fn set_string_output_type(&self, output_type: StringOutputType) -> Result<()> {
        self.lifecycle.configure(|s| s.output_type = output_type)
    }

    pub fn set_unicode_normalization_ignored(&self, ignored: bool) -> Result<()> {
        self.lifecycle
            .configure(|s| s.normalization_ignored = ignored)
    }

    /// Locks the configuration and derives key material now rather than on
    /// the first operation.
    pub fn initialize(&self) -> Result<()> {
        self.engine().map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_locked()
    }

    /// Whether a password was provided, even if it was already consumed.
    pub fn is_password_set(&self) -> bool {
        self.lifecycle.inspect(|s| s.password.is_set())
    }

    /// A copy of the configured password. Fails with `PasswordAlreadyCleaned`
    /// once the encryptor is initialized.
    pub fn password(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.lifecycle
            .inspect(|s| s.password.expose().map(|p| Zeroizing::new(p.to_vec())))
    }

    pub fn algorithm(&self) -> String {
        self.lifecycle.inspect(|s| s.algorithm.clone())
    }

    pub(crate) fn engine(&self) -> Result<Arc<Engine>> {
        self.lifecycle.engine(Engine::build)
    }
}

impl<M: ?Sized> std::fmt::Debug for StandardPbeEncryptor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardPbeEncryptor")
            .field("algorithm", &self.algorithm())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Encryptor for StandardPbeEncryptor<[u8]> {
    type Message = [u8];

    fn encrypt(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.engine()?.encrypt(message)
    }

    fn decrypt(&self, encrypted_message: &[u8]) -> Result<Vec<u8>> {
        self.engine()?.decrypt(encrypted_message)
    }
}

impl Encryptor for StandardPbeEncryptor<str> {
    type Message = str;

    fn encrypt(&self, message: &str) -> Result<String> {
        self.engine()?.encrypt_str(message)
    }

    fn decrypt(&self, encrypted_message: &str) -> Result<String> {
        self.engine()?.decrypt_str(encrypted_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FixedGenerator, ZeroGenerator};
    use crate::password::ConstantPasswordSource;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::thread;

    const FAST_ITERATIONS: u32 = 10;

    fn byte_encryptor(algorithm: &str) -> StandardPbeByteEncryptor {
        let encryptor = StandardPbeByteEncryptor::new();
        encryptor.set_algorithm(algorithm).unwrap();
        encryptor.set_password("test-pw").unwrap();
        encryptor
            .set_key_obtention_iterations(FAST_ITERATIONS)
            .unwrap();
        encryptor
    }

    const PBKDF2_ALGORITHMS: [&str; 4] = [
        "PBEWITHHMACSHA256ANDXSALSA20POLY1305",
        "PBEWITHHMACSHA512ANDCHACHA20POLY1305",
        "PBEWITHHMACSHA256ANDAES_256GCM",
        "PBEWITHHMACSHA512ANDAES_256GCM",
    ];

    #[test]
    fn test_roundtrip_every_algorithm() {
        for algorithm in PBKDF2_ALGORITHMS {
            let encryptor = byte_encryptor(algorithm);
            for message in [&b""[..], b"a", b"Hello World!", &[0xffu8; 1000][..]] {
                let encrypted = encryptor.encrypt(message).unwrap();
                assert_eq!(encryptor.decrypt(&encrypted).unwrap(), message);
            }
        }
    }

    #[test]
    fn test_roundtrip_scrypt() {
        let encryptor = byte_encryptor("PBEWITHSCRYPTANDXSALSA20POLY1305");
        let encrypted = encryptor.encrypt(b"test payload").unwrap();
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), b"test payload");
    }

    #[test]
    fn test_message_layout() {
        let classic = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
        // salt(8) + ciphertext + tag(16)
        assert_eq!(classic.encrypt(b"hello").unwrap().len(), 8 + 5 + 16);

        let aead = byte_encryptor("PBEWITHHMACSHA256ANDAES_256GCM");
        // salt(16) + iv(12) + ciphertext + tag(16)
        assert_eq!(aead.encrypt(b"hello").unwrap().len(), 16 + 12 + 5 + 16);

        let fixed = byte_encryptor("PBEWITHHMACSHA256ANDAES_256GCM");
        fixed.set_salt_generator(Arc::new(ZeroGenerator)).unwrap();
        fixed.set_iv_generator(Arc::new(ZeroGenerator)).unwrap();
        assert_eq!(fixed.encrypt(b"hello").unwrap().len(), 5 + 16);
    }

    #[test]
    fn test_random_salt_never_repeats() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(encryptor.encrypt(b"same message").unwrap()));
        }
    }

    #[test]
    fn test_fixed_salt_is_deterministic() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA512ANDCHACHA20POLY1305");
        encryptor
            .set_salt_generator(Arc::new(ZeroGenerator))
            .unwrap();
        encryptor.set_iv_generator(Arc::new(NoIvGenerator)).unwrap();
        let first = encryptor.encrypt(b"same message").unwrap();
        let second = encryptor.encrypt(b"same message").unwrap();
        assert_eq!(first, second);
        assert_eq!(encryptor.decrypt(&first).unwrap(), b"same message");
    }

    #[test]
    fn test_fixed_salt_matches_fresh_derivation() {
        let cached = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
        cached
            .set_salt_generator(Arc::new(FixedGenerator::from_string("12345678")))
            .unwrap();
        let encrypted = cached.encrypt(b"payload").unwrap();

        let algorithm = provider::default_provider()
            .pbe_algorithm("PBEWITHHMACSHA256ANDXSALSA20POLY1305")
            .unwrap();
        let key = algorithm
            .derive_key(b"test-pw", b"12345678", FAST_ITERATIONS)
            .unwrap();
        assert_eq!(algorithm.open(&key, &[], &encrypted).unwrap(), b"payload");
    }

    #[test]
    fn test_fixed_salt_too_short() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA256ANDAES_256GCM");
        encryptor
            .set_salt_generator(Arc::new(FixedGenerator::from_string("short")))
            .unwrap();
        let err = encryptor.encrypt(b"x").expect_err("needs 16 salt bytes");
        assert_eq!(err.kind, Some(ErrorKind::GeneratorExhausted));
        assert!(!encryptor.is_initialized());
        assert!(encryptor.is_password_set());
        assert!(encryptor.password().is_ok());
    }

    /// Random-looking generator that always comes up one byte short.
    #[derive(Debug)]
    struct ShortGenerator;

    impl RandomnessGenerator for ShortGenerator {
        fn generate(&self, len: usize) -> Result<Vec<u8>> {
            Ok(vec![7; len.saturating_sub(1)])
        }

        fn include_in_output(&self) -> bool {
            true
        }

        fn is_deterministic(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_empty_salt_generator_rejected_at_initialization() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
        encryptor
            .set_salt_generator(Arc::new(NoIvGenerator))
            .unwrap();
        let err = encryptor.encrypt(b"hello").expect_err("salt must be 8 bytes");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
        assert!(!encryptor.is_initialized());
    }

    #[test]
    fn test_none_salt_generator_rejected_in_config() {
        let config = EncryptorConfig {
            algorithm: Some("PBEWITHHMACSHA256ANDXSALSA20POLY1305".to_string()),
            password: SecretBuffer::new("test-pw"),
            salt_generator: Some(crate::generator::GeneratorSpec::NoIv),
            ..EncryptorConfig::default()
        };
        let err = StandardPbeByteEncryptor::with_config(config).expect_err("none is IV only");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_short_random_salt_fails_per_operation() {
        let encryptor = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        encryptor.set_salt_generator(Arc::new(ShortGenerator)).unwrap();
        let err = encryptor.encrypt(b"hello").expect_err("15-byte salt");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));

        let iv_short = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        iv_short.set_iv_generator(Arc::new(ShortGenerator)).unwrap();
        let err = iv_short.encrypt(b"hello").expect_err("11-byte IV");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_explicit_iv_algorithm_rejects_no_iv() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA512ANDAES_256GCM");
        encryptor.set_iv_generator(Arc::new(NoIvGenerator)).unwrap();
        let err = encryptor.initialize().expect_err("AES-GCM needs an IV");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_derived_iv_algorithm_ignores_iv_generator() {
        let encryptor = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
        encryptor.set_iv_generator(Arc::new(RandomGenerator)).unwrap();
        let encrypted = encryptor.encrypt(b"hello").unwrap();
        assert_eq!(encrypted.len(), 8 + 5 + 16);
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), b"hello");
    }

    #[test]
    fn test_lock_on_first_use() {
        let encryptor = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        encryptor.set_key_obtention_iterations(20).unwrap();
        assert!(!encryptor.is_initialized());

        encryptor.encrypt(b"lock").unwrap();
        assert!(encryptor.is_initialized());

        let errors = [
            encryptor.set_algorithm("PBEWITHHMACSHA256ANDAES_256GCM"),
            encryptor.set_password("other"),
            encryptor.set_key_obtention_iterations(5),
            encryptor.set_provider_name("RustCrypto"),
            encryptor.set_salt_generator(Arc::new(ZeroGenerator)),
            encryptor.set_iv_generator(Arc::new(ZeroGenerator)),
            encryptor.set_string_output_type(StringOutputType::Hexadecimal),
            encryptor.set_unicode_normalization_ignored(true),
        ];
        for result in errors {
            let err = result.expect_err("locked");
            assert_eq!(err.kind, Some(ErrorKind::AlreadyInitialized));
        }
    }

    #[test]
    fn test_password_cleared_after_initialization() {
        let encryptor = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        assert_eq!(&*encryptor.password().unwrap(), b"test-pw");
        encryptor.initialize().unwrap();

        assert!(encryptor.is_password_set());
        let err = encryptor.password().expect_err("consumed");
        assert_eq!(err.kind, Some(ErrorKind::PasswordAlreadyCleaned));
    }

    #[test]
    fn test_password_not_set() {
        let encryptor = StandardPbeByteEncryptor::new();
        let err = encryptor.encrypt(b"x").expect_err("no password");
        assert_eq!(err.kind, Some(ErrorKind::PasswordNotSet));
        assert!(!encryptor.is_initialized());

        encryptor.set_password("late").unwrap();
        encryptor.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();
        assert!(encryptor.encrypt(b"x").is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let encryptor = StandardPbeByteEncryptor::new();
        let err = encryptor
            .set_key_obtention_iterations(0)
            .expect_err("must be positive");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_unknown_algorithm_fails_before_key_material() {
        let encryptor = byte_encryptor("PBEWithMD5AndDES");
        let err = encryptor.encrypt(b"x").expect_err("unsupported");
        assert_eq!(err.kind, Some(ErrorKind::UnsupportedAlgorithm));
        assert!(encryptor.password().is_ok());
    }

    #[test]
    fn test_wrong_password_and_corruption_are_indistinguishable() {
        let encryptor = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        let encrypted = encryptor.encrypt(b"secret").unwrap();

        let other = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        other.set_password("wrong").unwrap();
        let wrong_password = other.decrypt(&encrypted).expect_err("wrong password");

        let mut corrupted = encrypted.clone();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;
        let corruption = encryptor.decrypt(&corrupted).expect_err("corrupted");

        let truncated = encryptor.decrypt(&encrypted[..10]).expect_err("truncated");

        for err in [wrong_password, corruption, truncated] {
            assert_eq!(err.kind, Some(ErrorKind::OperationNotPossible));
            assert_eq!(err.to_string(), "encryption operation not possible");
        }
    }

    #[test]
    fn test_string_encryptor_base64_and_hex() {
        let encryptor = StandardPbeStringEncryptor::new();
        encryptor.set_password("test-pw").unwrap();
        encryptor.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();
        let encrypted = encryptor.encrypt("Hello World!").unwrap();
        assert!(crate::codec::StringOutputType::Base64.decode(&encrypted).is_ok());
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "Hello World!");

        let hex = StandardPbeStringEncryptor::new();
        hex.set_password("test-pw").unwrap();
        hex.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();
        hex.set_string_output_type(StringOutputType::Hexadecimal)
            .unwrap();
        let encrypted = hex.encrypt("Hello World!").unwrap();
        assert!(encrypted.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex.decrypt(&encrypted).unwrap(), "Hello World!");
    }

    #[test]
    fn test_string_encryptor_normalizes_unicode() {
        let encryptor = StandardPbeStringEncryptor::new();
        encryptor.set_password("test-pw").unwrap();
        encryptor.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();

        // "e" followed by a combining acute accent decrypts to the precomposed form.
        let decomposed = "cafe\u{0301}";
        let encrypted = encryptor.encrypt(decomposed).unwrap();
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "caf\u{00e9}");
    }

    #[test]
    fn test_string_encryptor_normalization_ignored() {
        let encryptor = StandardPbeStringEncryptor::new();
        encryptor.set_password("test-pw").unwrap();
        encryptor.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();
        encryptor.set_unicode_normalization_ignored(true).unwrap();
        let encrypted = encryptor.encrypt("cafe\u{0301}").unwrap();
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "cafe\u{0301}");
    }

    #[test]
    fn test_string_decrypt_of_garbage() {
        let encryptor = StandardPbeStringEncryptor::new();
        encryptor.set_password("test-pw").unwrap();
        let err = encryptor.decrypt("not base64 at all!").expect_err("garbage");
        assert_eq!(err.kind, Some(ErrorKind::OperationNotPossible));
    }

    #[test]
    fn test_with_config() {
        let config = EncryptorConfig {
            algorithm: Some("PBEWITHHMACSHA256ANDAES_256GCM".to_string()),
            password: SecretBuffer::new(b"from-config".to_vec()),
            key_obtention_iterations: Some(FAST_ITERATIONS),
            string_output_type: Some(StringOutputType::Hexadecimal),
            ..EncryptorConfig::default()
        };
        let encryptor = StandardPbeStringEncryptor::with_config(config).unwrap();
        assert_eq!(encryptor.algorithm(), "PBEWITHHMACSHA256ANDAES_256GCM");
        let encrypted = encryptor.encrypt("configured").unwrap();
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "configured");
    }

    #[test]
    fn test_with_config_unknown_provider() {
        let config = EncryptorConfig {
            password: SecretBuffer::new(b"pw".to_vec()),
            provider_name: Some("SunJCE".to_string()),
            ..EncryptorConfig::default()
        };
        let encryptor = StandardPbeByteEncryptor::with_config(config).unwrap();
        let err = encryptor.initialize().expect_err("unknown provider");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_password_from_source() {
        let encryptor = StandardPbeByteEncryptor::new();
        let mut source = ConstantPasswordSource::new(b"sourced".to_vec());
        encryptor.set_password_from(&mut source).unwrap();
        assert_eq!(&*encryptor.password().unwrap(), b"sourced");
    }

    #[test]
    fn test_cross_instance_compatibility() {
        let first = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        let second = byte_encryptor(DEFAULT_PBE_ALGORITHM);
        let encrypted = first.encrypt(b"shared").unwrap();
        assert_eq!(second.decrypt(&encrypted).unwrap(), b"shared");
    }

    #[test]
    fn test_shared_across_threads() {
        let encryptor = Arc::new(byte_encryptor(DEFAULT_PBE_ALGORITHM));
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let encryptor = Arc::clone(&encryptor);
                thread::spawn(move || {
                    let message = vec![i; 64];
                    let encrypted = encryptor.encrypt(&message).unwrap();
                    assert_eq!(encryptor.decrypt(&encrypted).unwrap(), message);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(encryptor.is_initialized());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_byte_roundtrip(message in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encryptor = byte_encryptor("PBEWITHHMACSHA256ANDXSALSA20POLY1305");
            let encrypted = encryptor.encrypt(&message).unwrap();
            prop_assert_eq!(encryptor.decrypt(&encrypted).unwrap(), message);
        }

        #[test]
        fn prop_string_roundtrip(message in "\\PC*") {
            let encryptor = StandardPbeStringEncryptor::new();
            encryptor.set_password("test-pw").unwrap();
            encryptor.set_key_obtention_iterations(FAST_ITERATIONS).unwrap();
            encryptor.set_unicode_normalization_ignored(true).unwrap();
            let encrypted = encryptor.encrypt(&message).unwrap();
            prop_assert_eq!(encryptor.decrypt(&encrypted).unwrap(), message);
        }
    }
}
