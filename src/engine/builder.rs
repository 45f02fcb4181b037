//! Builder for configuring cache instances

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{HalCache, Inner};
use crate::config::CacheConfig;
use crate::hal::{HalNormalizer, Normalizer, Rfc6570Expander, TemplateExpander};
use crate::store::Store;
use crate::transport::{HttpTransport, Transport};
use crate::{HalCacheError, Result};

/// Builder for configuring cache instances.
pub struct HalCacheBuilder {
    config: CacheConfig,
    transport: Option<Arc<dyn Transport>>,
    normalizer: Option<Arc<dyn Normalizer>>,
    expander: Option<Arc<dyn TemplateExpander>>,
}

impl Default for HalCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HalCacheBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            transport: None,
            normalizer: None,
            expander: None,
        }
    }

    /// Replace the whole configuration (e.g. one loaded from a file).
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Base URL of the API (e.g. `https://api.example.com`).
    pub fn api_root(mut self, api_root: impl Into<String>) -> Self {
        self.config.api_root = api_root.into();
        self
    }

    /// Use a custom transport instead of the default HTTP client.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom document normalizer instead of HAL+JSON.
    pub fn normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Some(Arc::new(normalizer));
        self
    }

    /// Use a custom URI template expander.
    pub fn template_expander(mut self, expander: impl TemplateExpander + 'static) -> Self {
        self.expander = Some(Arc::new(expander));
        self
    }

    /// Trust the requested URI over the self link in GET/PATCH responses.
    pub fn force_requested_self_link(mut self, enabled: bool) -> Self {
        self.config.force_requested_self_link = enabled;
        self
    }

    /// Reload an embedded collection's owner instead of fetching each
    /// unknown item (default: enabled).
    pub fn avoid_n_plus_one_requests(mut self, enabled: bool) -> Self {
        self.config.avoid_n_plus_one_requests = enabled;
        self
    }

    /// Request timeout of the default HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Events buffered per change subscriber.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    ///
    /// Returns `HalCacheError::Configuration` if the API root is not a valid
    /// URL, if no API root is set while the default HTTP transport is used
    /// (its requests would have no host), or if the timeout is zero.
    pub fn build(self) -> Result<HalCache> {
        if self.config.timeout_ms == 0 {
            return Err(HalCacheError::Configuration(
                "timeout must be at least one millisecond".to_string(),
            ));
        }
        let api_root = self.config.api_root.trim_end_matches('/').to_string();
        if !api_root.is_empty() {
            url::Url::parse(&api_root).map_err(|e| {
                HalCacheError::Configuration(format!("invalid API root {api_root:?}: {e}"))
            })?;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None if api_root.is_empty() => {
                return Err(HalCacheError::Configuration(
                    "API root is required for the default HTTP transport".to_string(),
                ));
            }
            None => Arc::new(HttpTransport::with_timeout(self.config.timeout())?),
        };

        let config = CacheConfig {
            api_root,
            ..self.config
        };
        info!(api_root = %config.api_root, "hal-cache initialized");

        Ok(HalCache {
            inner: Arc::new(Inner {
                store: Store::new(config.event_capacity),
                transport,
                normalizer: self
                    .normalizer
                    .unwrap_or_else(|| Arc::new(HalNormalizer)),
                expander: self
                    .expander
                    .unwrap_or_else(|| Arc::new(Rfc6570Expander)),
                config,
            }),
        })
    }
}
