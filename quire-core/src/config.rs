//! Configuration types

use crate::error::{ConfigError, QuireError, QuireResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Number of reviews shown on the latest-reviews feed.
pub const DEFAULT_LATEST_REVIEWS_LIMIT: u32 = 50;

/// Entity cache tuning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Treat Fresh entries older than this as Stale. `None` keeps entries
    /// Fresh until a mutation invalidates them.
    pub stale_after_ms: Option<u64>,
}

impl CacheSettings {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

/// Resource resolver tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageSettings {
    /// MIME type assumed for fetched bytes whose format cannot be sniffed.
    pub default_mime: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            default_mime: "image/jpeg".to_string(),
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuireConfig {
    pub latest_reviews_limit: u32,
    pub cache: CacheSettings,
    pub images: ImageSettings,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            latest_reviews_limit: DEFAULT_LATEST_REVIEWS_LIMIT,
            cache: CacheSettings::default(),
            images: ImageSettings::default(),
        }
    }
}

impl QuireConfig {
    /// Read, parse and validate a TOML config file.
    pub fn from_path(path: &Path) -> QuireResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> QuireResult<Self> {
        let config: QuireConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - latest_reviews_limit > 0
    /// - cache.stale_after_ms > 0 when set
    /// - images.default_mime is an `image/*` type
    pub fn validate(&self) -> QuireResult<()> {
        if self.latest_reviews_limit == 0 {
            return Err(QuireError::Config(ConfigError::InvalidValue {
                field: "latest_reviews_limit",
                reason: "must be > 0".to_string(),
            }));
        }

        if self.cache.stale_after_ms == Some(0) {
            return Err(QuireError::Config(ConfigError::InvalidValue {
                field: "cache.stale_after_ms",
                reason: "must be > 0 when set".to_string(),
            }));
        }

        let mime = self.images.default_mime.trim();
        if !mime.starts_with("image/") || mime.len() == "image/".len() {
            return Err(QuireError::Config(ConfigError::InvalidValue {
                field: "images.default_mime",
                reason: format!("'{}' is not an image MIME type", self.images.default_mime),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QuireConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.latest_reviews_limit, 50);
        assert_eq!(config.cache.stale_after(), None);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = QuireConfig::from_toml_str(
            r#"
            latest_reviews_limit = 20

            [cache]
            stale_after_ms = 30000
            "#,
        )
        .unwrap();
        assert_eq!(config.latest_reviews_limit, 20);
        assert_eq!(config.cache.stale_after(), Some(Duration::from_secs(30)));
        assert_eq!(config.images.default_mime, "image/jpeg");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = QuireConfig::from_toml_str("refresh_everything = true").unwrap_err();
        assert!(matches!(err, QuireError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_non_image_mime_rejected() {
        let err = QuireConfig::from_toml_str("[images]\ndefault_mime = \"text/plain\"").unwrap_err();
        assert!(matches!(
            err,
            QuireError::Config(ConfigError::InvalidValue {
                field: "images.default_mime",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = QuireConfig::from_path(Path::new("/nonexistent/quire.toml")).unwrap_err();
        match err {
            QuireError::Config(ConfigError::Io { path, .. }) => {
                assert!(path.contains("quire.toml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_positive_limits_accepted(limit in 1u32..=10_000, stale in proptest::option::of(1u64..=86_400_000)) {
            let config = QuireConfig {
                latest_reviews_limit: limit,
                cache: CacheSettings { stale_after_ms: stale },
                images: ImageSettings::default(),
            };
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_zero_limit_rejected(stale in proptest::option::of(1u64..=86_400_000)) {
            let config = QuireConfig {
                latest_reviews_limit: 0,
                cache: CacheSettings { stale_after_ms: stale },
                images: ImageSettings::default(),
            };
            let result = config.validate();
            if let Err(QuireError::Config(ConfigError::InvalidValue { field, .. })) = result {
                prop_assert_eq!(field, "latest_reviews_limit");
            } else {
                prop_assert!(false, "Expected ConfigError::InvalidValue");
            }
        }
    }
}
