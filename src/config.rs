//! Configuration values for encryptors and digesters
//!
//! Every field is optional: an unset field leaves the corresponding setting
//! at its documented default. Configs can be deserialized with `serde` by
//! whatever loader owns the file format, or read from environment variables.

use crate::codec::StringOutputType;
use crate::error::{ErrorCategory, ErrorKind, PbeError, Result};
use crate::generator::GeneratorSpec;
use crate::password::SecretBuffer;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EncryptorConfig {
    pub algorithm: Option<String>,
    #[serde(deserialize_with = "deserialize_password")]
    pub password: SecretBuffer,
    pub provider_name: Option<String>,
    pub key_obtention_iterations: Option<u32>,
    pub salt_generator: Option<GeneratorSpec>,
    pub iv_generator: Option<GeneratorSpec>,
    pub string_output_type: Option<StringOutputType>,
    pub unicode_normalization_ignored: Option<bool>,
}

impl EncryptorConfig {
    /// Reads `<PREFIX>_ALGORITHM`, `<PREFIX>_PASSWORD`, `<PREFIX>_PROVIDER`,
    /// `<PREFIX>_ITERATIONS`, `<PREFIX>_SALT_GENERATOR`, `<PREFIX>_IV_GENERATOR`,
    /// `<PREFIX>_STRING_OUTPUT_TYPE` and `<PREFIX>_UNICODE_NORMALIZATION_IGNORED`
    /// from the process environment.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Like [`EncryptorConfig::from_env`], with an arbitrary key lookup.
    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = PrefixedLookup { prefix, lookup };
        let config = Self {
            algorithm: vars.get("ALGORITHM"),
            password: vars
                .get("PASSWORD")
                .map(|p| SecretBuffer::new(p.into_bytes()))
                .unwrap_or_default(),
            provider_name: vars.get("PROVIDER"),
            key_obtention_iterations: vars.parse("ITERATIONS")?,
            salt_generator: vars.parse_verbatim("SALT_GENERATOR")?,
            iv_generator: vars.parse_verbatim("IV_GENERATOR")?,
            string_output_type: vars.parse("STRING_OUTPUT_TYPE")?,
            unicode_normalization_ignored: vars.parse("UNICODE_NORMALIZATION_IGNORED")?,
        };
        tracing::debug!(
            prefix,
            algorithm = ?config.algorithm,
            password_set = config.password.is_set(),
            "loaded encryptor configuration from environment"
        );
        Ok(config)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DigesterConfig {
    pub algorithm: Option<String>,
    pub provider_name: Option<String>,
    pub iterations: Option<u32>,
    pub salt_size_bytes: Option<usize>,
    pub salt_generator: Option<GeneratorSpec>,
    pub invert_salt_position_before_digesting: Option<bool>,
    pub invert_salt_position_in_output: Option<bool>,
    pub string_output_type: Option<StringOutputType>,
    pub unicode_normalization_ignored: Option<bool>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl DigesterConfig {
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = PrefixedLookup { prefix, lookup };
        let config = Self {
            algorithm: vars.get("ALGORITHM"),
            provider_name: vars.get("PROVIDER"),
            iterations: vars.parse("ITERATIONS")?,
            salt_size_bytes: vars.parse("SALT_SIZE_BYTES")?,
            salt_generator: vars.parse_verbatim("SALT_GENERATOR")?,
            invert_salt_position_before_digesting: vars
                .parse("INVERT_SALT_POSITION_BEFORE_DIGESTING")?,
            invert_salt_position_in_output: vars.parse("INVERT_SALT_POSITION_IN_OUTPUT")?,
            string_output_type: vars.parse("STRING_OUTPUT_TYPE")?,
            unicode_normalization_ignored: vars.parse("UNICODE_NORMALIZATION_IGNORED")?,
            prefix: vars.get("PREFIX"),
            suffix: vars.get("SUFFIX"),
        };
        tracing::debug!(
            prefix,
            algorithm = ?config.algorithm,
            "loaded digester configuration from environment"
        );
        Ok(config)
    }
}

struct PrefixedLookup<'a, F> {
    prefix: &'a str,
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> PrefixedLookup<'_, F> {
    fn key(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.key(name))
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parse_with(name, str::trim)
    }

    /// For values whose payload is significant byte for byte, such as
    /// `fixed:` generator values.
    fn parse_verbatim<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parse_with(name, |raw| raw)
    }

    fn parse_with<T>(&self, name: &str, prepare: fn(&str) -> &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        prepare(&raw).parse().map(Some).map_err(|e| {
            PbeError::with_kind_and_source(
                ErrorCategory::Configuration,
                ErrorKind::InvalidParameter,
                format!("invalid value for {}", self.key(name)),
                e,
            )
        })
    }
}

fn deserialize_password<'de, D>(deserializer: D) -> std::result::Result<SecretBuffer, D::Error>
where
    D: Deserializer<'de>,
{
    let password = String::deserialize(deserializer)?;
    Ok(SecretBuffer::new(password.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_encryptor_config_from_lookup() {
        let config = EncryptorConfig::from_lookup(
            "APP_ENC",
            lookup(&[
                ("APP_ENC_ALGORITHM", "PBEWITHHMACSHA256ANDAES_256GCM"),
                ("APP_ENC_PASSWORD", "s3cret"),
                ("APP_ENC_ITERATIONS", "2000"),
                ("APP_ENC_SALT_GENERATOR", "zero"),
                ("APP_ENC_STRING_OUTPUT_TYPE", "hexadecimal"),
                ("APP_ENC_UNICODE_NORMALIZATION_IGNORED", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.algorithm.as_deref(),
            Some("PBEWITHHMACSHA256ANDAES_256GCM")
        );
        assert_eq!(config.password.expose().unwrap(), b"s3cret");
        assert_eq!(config.key_obtention_iterations, Some(2000));
        assert_eq!(config.salt_generator, Some(GeneratorSpec::Zero));
        assert_eq!(config.iv_generator, None);
        assert_eq!(
            config.string_output_type,
            Some(StringOutputType::Hexadecimal)
        );
        assert_eq!(config.unicode_normalization_ignored, Some(true));
    }

    #[test]
    fn test_bad_iterations_value() {
        let err = EncryptorConfig::from_lookup("X", lookup(&[("X_ITERATIONS", "many")]))
            .expect_err("not a number");
        assert_eq!(err.kind, Some(ErrorKind::InvalidParameter));
        assert!(err.message().contains("X_ITERATIONS"));
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = EncryptorConfig::from_lookup("NOTHING", |_| None).unwrap();
        assert!(config.algorithm.is_none());
        assert!(!config.password.is_set());
    }

    #[test]
    fn test_encryptor_config_deserialize() {
        let config: EncryptorConfig = serde_json::from_str(
            r#"{
                "algorithm": "PBEWITHHMACSHA512ANDCHACHA20POLY1305",
                "password": "jasper",
                "key-obtention-iterations": 10,
                "salt-generator": "fixed:saltsalt",
                "string-output-type": "base64"
            }"#,
        )
        .unwrap();
        assert_eq!(config.password.expose().unwrap(), b"jasper");
        assert_eq!(
            config.salt_generator,
            Some(GeneratorSpec::Fixed(b"saltsalt".to_vec()))
        );
        assert_eq!(config.string_output_type, Some(StringOutputType::Base64));
    }

    #[test]
    fn test_deserialize_rejects_bad_identifiers() {
        let result: std::result::Result<EncryptorConfig, _> =
            serde_json::from_str(r#"{"salt-generator": "dice"}"#);
        assert!(result.is_err());
        let result: std::result::Result<DigesterConfig, _> =
            serde_json::from_str(r#"{"string-output-type": "base32"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_salt_same_from_env_and_serde() {
        let from_env = EncryptorConfig::from_lookup(
            "APP",
            lookup(&[("APP_SALT_GENERATOR", " Fixed: pepper ")]),
        )
        .unwrap();
        let from_json: EncryptorConfig =
            serde_json::from_str(r#"{"salt-generator": " Fixed: pepper "}"#).unwrap();

        let expected = Some(GeneratorSpec::Fixed(b" pepper ".to_vec()));
        assert_eq!(from_env.salt_generator, expected);
        assert_eq!(from_json.salt_generator, expected);

        let digester = DigesterConfig::from_lookup(
            "DIG",
            lookup(&[("DIG_SALT_GENERATOR", "fixed:  ")]),
        )
        .unwrap();
        assert_eq!(digester.salt_generator, Some(GeneratorSpec::Fixed(b"  ".to_vec())));
    }

    #[test]
    fn test_digester_config_from_lookup() {
        let config = DigesterConfig::from_lookup(
            "DIG",
            lookup(&[
                ("DIG_ALGORITHM", "SHA-512"),
                ("DIG_SALT_SIZE_BYTES", "0"),
                ("DIG_ITERATIONS", "1"),
                ("DIG_PREFIX", "{SHA}"),
            ]),
        )
        .unwrap();
        assert_eq!(config.algorithm.as_deref(), Some("SHA-512"));
        assert_eq!(config.salt_size_bytes, Some(0));
        assert_eq!(config.iterations, Some(1));
        assert_eq!(config.prefix.as_deref(), Some("{SHA}"));
        assert_eq!(config.suffix, None);
    }
}
