//! Algorithm name validation
//!
//! Classic PBE schemes, whose IV comes out of the key schedule, are listed in
//! a static table together with their salt size. Schemes with an explicit IV
//! leave the salt size to the provider, which is asked for its metadata.

use crate::error::{ErrorKind, PbeError, Result};
use crate::provider::{IvSource, PbeAlgorithm, Provider};

/// Classic PBE algorithm names and the salt size they mandate.
const CLASSIC_PBE_SALT_SIZES: &[(&str, usize)] = &[
    ("PBEWITHHMACSHA256ANDXSALSA20POLY1305", 8),
    ("PBEWITHSCRYPTANDXSALSA20POLY1305", 8),
    ("PBEWITHHMACSHA512ANDCHACHA20POLY1305", 8),
];

/// Algorithm used when none is configured.
pub const DEFAULT_PBE_ALGORITHM: &str = "PBEWITHHMACSHA512ANDAES_256GCM";

/// Digest algorithm used when none is configured.
pub const DEFAULT_DIGEST_ALGORITHM: &str = "SHA-256";

pub struct AlgorithmCatalog;

impl AlgorithmCatalog {
    /// Canonical form of an algorithm name; names are case-insensitive.
    pub fn canonical_name(name: &str) -> String {
        name.trim().to_ascii_uppercase()
    }

    /// Whether `name` is one of the classic, derived-IV algorithms.
    pub fn is_classic(name: &str) -> bool {
        Self::static_salt_size(&Self::canonical_name(name)).is_some()
    }

    /// Fails with `UnsupportedAlgorithm` unless both the catalog and the
    /// provider know `name`.
    pub fn validate(name: &str, provider: &dyn Provider) -> Result<()> {
        Self::resolve(name, provider).map(|_| ())
    }

    pub fn required_salt_bytes(name: &str, provider: &dyn Provider) -> Result<usize> {
        let canonical = Self::canonical_name(name);
        match Self::static_salt_size(&canonical) {
            Some(size) => {
                Self::resolve(&canonical, provider)?;
                Ok(size)
            }
            None => Ok(Self::resolve(&canonical, provider)?.salt_len()),
        }
    }

    pub fn requires_explicit_iv(name: &str, provider: &dyn Provider) -> Result<bool> {
        Ok(Self::resolve(name, provider)?.iv_source() == IvSource::Explicit)
    }

    /// Looks up the primitives for `name`, cross-checking the static table
    /// against what the provider reports.
    pub fn resolve(name: &str, provider: &dyn Provider) -> Result<PbeAlgorithm> {
        let canonical = Self::canonical_name(name);
        let algorithm = provider.pbe_algorithm(&canonical).ok_or_else(|| {
            PbeError::configuration(
                ErrorKind::UnsupportedAlgorithm,
                format!(
                    "algorithm {} is not supported by provider {}",
                    canonical,
                    provider.name()
                ),
            )
        })?;
        if let Some(size) = Self::static_salt_size(&canonical) {
            if algorithm.iv_source() != IvSource::Derived || algorithm.salt_len() != size {
                return Err(PbeError::configuration(
                    ErrorKind::UnsupportedAlgorithm,
                    format!(
                        "provider {} disagrees with the catalog on algorithm {}",
                        provider.name(),
                        canonical
                    ),
                ));
            }
        }
        Ok(algorithm)
    }

    fn static_salt_size(canonical: &str) -> Option<usize> {
        CLASSIC_PBE_SALT_SIZES
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(_, size)| *size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DigestAlgorithm, RustCryptoProvider};

    /// Provider that only offers the classic algorithms.
    #[derive(Debug)]
    struct ClassicOnlyProvider;

    impl Provider for ClassicOnlyProvider {
        fn name(&self) -> &str {
            "ClassicOnly"
        }

        fn pbe_algorithm(&self, name: &str) -> Option<PbeAlgorithm> {
            RustCryptoProvider
                .pbe_algorithm(name)
                .filter(|a| a.iv_source() == IvSource::Derived)
        }

        fn digest_algorithm(&self, name: &str) -> Option<DigestAlgorithm> {
            RustCryptoProvider.digest_algorithm(name)
        }
    }

    #[test]
    fn test_validate_known_names_case_insensitively() {
        AlgorithmCatalog::validate("PBEWithHMACSHA512AndAES_256GCM", &RustCryptoProvider).unwrap();
        AlgorithmCatalog::validate(" pbewithscryptandxsalsa20poly1305 ", &RustCryptoProvider)
            .unwrap();
    }

    #[test]
    fn test_unknown_algorithm_fails() {
        let err = AlgorithmCatalog::validate("PBEWithMD5AndDES", &RustCryptoProvider)
            .expect_err("not implemented by any provider");
        assert_eq!(err.kind, Some(ErrorKind::UnsupportedAlgorithm));
    }

    #[test]
    fn test_salt_sizes() {
        assert_eq!(
            AlgorithmCatalog::required_salt_bytes(
                "PBEWITHHMACSHA256ANDXSALSA20POLY1305",
                &RustCryptoProvider
            )
            .unwrap(),
            8
        );
        assert_eq!(
            AlgorithmCatalog::required_salt_bytes(DEFAULT_PBE_ALGORITHM, &RustCryptoProvider)
                .unwrap(),
            16
        );
    }

    #[test]
    fn test_explicit_iv_metadata() {
        assert!(
            AlgorithmCatalog::requires_explicit_iv(DEFAULT_PBE_ALGORITHM, &RustCryptoProvider)
                .unwrap()
        );
        assert!(
            !AlgorithmCatalog::requires_explicit_iv(
                "PBEWITHHMACSHA512ANDCHACHA20POLY1305",
                &RustCryptoProvider
            )
            .unwrap()
        );
        assert!(AlgorithmCatalog::is_classic("pbewithhmacsha256andxsalsa20poly1305"));
        assert!(!AlgorithmCatalog::is_classic(DEFAULT_PBE_ALGORITHM));
    }

    #[test]
    fn test_provider_without_algorithm_fails() {
        let err = AlgorithmCatalog::validate(DEFAULT_PBE_ALGORITHM, &ClassicOnlyProvider)
            .expect_err("provider does not offer AES-GCM");
        assert_eq!(err.kind, Some(ErrorKind::UnsupportedAlgorithm));
        assert!(err.message().contains("ClassicOnly"));
    }
}
