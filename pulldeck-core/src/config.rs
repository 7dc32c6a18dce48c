//! Configuration loading for the pulldeck engine.
//!
//! The dashboard binary hands a TOML file path via `--config` or the
//! `PULLDECK_CONFIG` environment variable. All tunables the core consumes
//! (worker count, TTLs, per-item timeout) arrive through here.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashConfig {
    /// Number of enhancement workers.
    pub worker_count: usize,
    /// Job queue depth as a multiple of the worker count.
    #[serde(default = "default_queue_depth_multiplier")]
    pub queue_depth_multiplier: usize,
    /// Per-item detail fetch timeout.
    #[serde(default = "default_per_item_timeout_ms")]
    pub per_item_timeout_ms: u64,
    pub cache: CacheSettings,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache root directory. `None` disables the persistent cache.
    pub root: Option<PathBuf>,
    #[serde(default = "default_details_ttl_secs")]
    pub details_ttl_secs: u64,
    #[serde(default = "default_list_ttl_secs")]
    pub list_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Explicit API token. Falls back to GITHUB_TOKEN / GH_TOKEN when unset.
    pub token: Option<String>,
}

fn default_queue_depth_multiplier() -> usize {
    2
}

fn default_per_item_timeout_ms() -> u64 {
    10_000
}

fn default_details_ttl_secs() -> u64 {
    15 * 60
}

fn default_list_ttl_secs() -> u64 {
    60
}

impl DashConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let config: DashConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_count",
                reason: "must be > 0".to_string(),
            });
        }
        if self.queue_depth_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_depth_multiplier",
                reason: "must be > 0".to_string(),
            });
        }
        if self.per_item_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "per_item_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.details_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.details_ttl_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.list_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.list_ttl_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(root) = &self.cache.root {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.root",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_millis(self.per_item_timeout_ms)
    }

    pub fn details_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.details_ttl_secs)
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.list_ttl_secs)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("PULLDECK_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_with_defaults() {
        let file = write_config(
            r#"
            worker_count = 4

            [cache]
            root = "/tmp/pulldeck-cache"
            "#,
        );
        let config = DashConfig::from_path(file.path()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_depth_multiplier, 2);
        assert_eq!(config.per_item_timeout(), Duration::from_secs(10));
        assert_eq!(config.details_ttl(), Duration::from_secs(900));
        assert_eq!(config.list_ttl(), Duration::from_secs(60));
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_worker_count() {
        let file = write_config(
            r#"
            worker_count = 0

            [cache]
            root = "/tmp/pulldeck-cache"
            "#,
        );
        let config = DashConfig::from_path(file.path()).unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("worker_count"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let file = write_config(
            r#"
            worker_count = 4
            colour_scheme = "mauve"

            [cache]
            root = "/tmp/pulldeck-cache"
            "#,
        );
        assert!(matches!(
            DashConfig::from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_cache_root_none_is_valid() {
        let file = write_config(
            r#"
            worker_count = 2

            [cache]
            details_ttl_secs = 30
            "#,
        );
        let config = DashConfig::from_path(file.path()).unwrap();
        config.validate().unwrap();
        assert!(config.cache.root.is_none());
        assert_eq!(config.details_ttl(), Duration::from_secs(30));
    }
}
