//! Cache configuration.
//!
//! Built in code through [`CacheConfig`]'s setters or deserialized from
//! TOML. With the `cli` feature, [`CacheConfig::load`] resolves a config
//! file in this order:
//! 1. explicit path (CLI flag)
//! 2. `<config dir>/hal-cache/config.toml` (user)
//!
//! A missing user file is not an error; defaults apply.

use std::time::Duration;

use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Base URL of the API. Stripped from every URI used as a cache key and
    /// prepended to every request.
    #[serde(default)]
    pub api_root: String,
    /// Overwrite the response's self link with the requested URI on
    /// GET and PATCH (for APIs that answer with a redirect target).
    #[serde(default)]
    pub force_requested_self_link: bool,
    /// Reload the owner of an embedded collection once instead of fetching
    /// each unknown item separately (default: true).
    #[serde(default = "default_avoid_n_plus_one")]
    pub avoid_n_plus_one_requests: bool,
    /// Request timeout in milliseconds for the default HTTP transport
    /// (default: 30000). Must not be zero.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Buffered change events per subscriber (default: 256).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            api_root: String::new(),
            force_requested_self_link: false,
            avoid_n_plus_one_requests: default_avoid_n_plus_one(),
            timeout_ms: default_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_avoid_n_plus_one() -> bool {
    true
}

fn default_timeout() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    256
}

impl CacheConfig {
    pub fn api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn force_requested_self_link(mut self, enabled: bool) -> Self {
        self.force_requested_self_link = enabled;
        self
    }

    pub fn avoid_n_plus_one_requests(mut self, enabled: bool) -> Self {
        self.avoid_n_plus_one_requests = enabled;
        self
    }

    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout_ms = millis;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(feature = "cli")]
mod file {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::CacheConfig;
    use crate::{HalCacheError, Result};

    impl CacheConfig {
        /// Load configuration from an explicit path or the user config dir.
        pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
            let Some(path) = Self::resolve_config_path(explicit_path)? else {
                return Ok(Self::default());
            };
            let content = fs::read_to_string(&path).map_err(|e| {
                HalCacheError::Configuration(format!("Failed to read config file {path:?}: {e}"))
            })?;
            toml::from_str(&content).map_err(|e| {
                HalCacheError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
            })
        }

        fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
            if let Some(path) = explicit {
                if path.exists() {
                    return Ok(Some(path.to_path_buf()));
                }
                return Err(HalCacheError::Configuration(format!(
                    "Config file not found: {path:?}"
                )));
            }

            Ok(dirs::config_dir()
                .map(|dir| dir.join("hal-cache").join("config.toml"))
                .filter(|path| path.exists()))
        }
    }
}
