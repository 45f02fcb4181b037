//! The cache engine: load coordination, mutations and the public handle.

mod builder;
mod loader;
mod mutation;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::CacheConfig;
use crate::facade::{self, Facade};
use crate::hal::{Normalizer, TemplateExpander, TemplateParams};
use crate::store::{LoadHandle, Store, StoreEvent};
use crate::telemetry;
use crate::transport::{Transport, TransportResult};
use crate::types::{Link, Snapshot, Target, normalize_entity_uri, normalize_uri};
use crate::{HalCacheError, Result};

pub use builder::HalCacheBuilder;

/// Handle to one cache instance.
///
/// Cheap to clone; every clone shares the same table, transport and
/// configuration. Construct once with [`HalCache::builder`] and pass it to
/// whatever needs API access.
///
/// Loads are spawned onto the ambient tokio runtime, so every method that
/// may start a request must be called from within a runtime context.
#[derive(Clone)]
pub struct HalCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: CacheConfig,
    store: Store,
    transport: Arc<dyn Transport>,
    normalizer: Arc<dyn Normalizer>,
    expander: Arc<dyn TemplateExpander>,
}

impl std::fmt::Debug for HalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalCache")
            .field("api_root", &self.inner.config.api_root)
            .field("entries", &self.inner.store.len())
            .finish()
    }
}

impl HalCache {
    /// Create a new builder for configuring the cache.
    pub fn builder() -> HalCacheBuilder {
        HalCacheBuilder::new()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Read-only access to the underlying table.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Subscribe to table changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.store.subscribe()
    }

    /// Table changes as a stream. Events missed by a slow consumer are
    /// skipped with a warning.
    pub fn changes(&self) -> Pin<Box<dyn Stream<Item = StoreEvent> + Send>> {
        let stream = BroadcastStream::new(self.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "change subscriber lagged");
                None
            }
        });
        Box::pin(stream)
    }

    /// Current snapshot at `uri`, without triggering any request.
    pub fn snapshot(&self, uri: &str) -> Option<Snapshot> {
        self.inner.store.get(&self.canonical(uri))
    }

    /// Whether `uri` was never placed in the table.
    pub fn is_unknown(&self, uri: &str) -> bool {
        !self.inner.store.contains(&self.canonical(uri))
    }

    /// Return the cached entity at `target`, fetching it first if unknown.
    ///
    /// Never waits: while a fetch is outstanding the result is a
    /// [`Facade::Loading`] placeholder. Passing back a placeholder that has
    /// no URI yet returns it unchanged.
    ///
    /// # Errors
    ///
    /// [`HalCacheError::Unidentifiable`] if `target` carries no URI at all.
    pub fn get(&self, target: impl Into<Target>) -> Result<Facade> {
        self.get_with(target, false)
    }

    /// Like [`get`](Self::get), optionally forcing a refetch of cached data.
    ///
    /// A forced reload still returns the current data immediately; await
    /// [`Facade::loaded`] for the refreshed version.
    pub fn get_with(&self, target: impl Into<Target>, force_reload: bool) -> Result<Facade> {
        let target = target.into();
        let Some(uri) = normalize_entity_uri(&target, &self.inner.config.api_root) else {
            return match target {
                Target::Facade(loading @ Facade::Loading(_)) => Ok(loading),
                other => Err(HalCacheError::Unidentifiable {
                    operation: "GET",
                    value: other.describe(),
                }),
            };
        };
        let (snapshot, handle) = self.load(&uri, force_reload);
        Ok(self.wrap(snapshot, handle))
    }

    /// Refetch `target` and return it once the fresh data is merged.
    ///
    /// An embedded collection is refreshed by reloading its owner. A
    /// placeholder without a URI resolves with its pending load; if that
    /// load finds nothing the result is [`HalCacheError::InvalidResponse`].
    pub async fn reload(&self, target: impl Into<Target>) -> Result<Facade> {
        self.start_reload(&target.into())?.await
    }

    /// Create an entity under the collection at `target`.
    ///
    /// Does not reload the collection; callers that display it should
    /// reload it themselves.
    pub async fn post(&self, target: impl Into<Target>, data: &Value) -> Result<Facade> {
        let uri = self.require_uri(&target.into(), "POST")?;
        let cache = self.clone();
        let body = data.clone();
        join(tokio::spawn(async move { cache.create(uri, body).await })).await
    }

    /// Update fields of the entity at `target`.
    pub async fn patch(&self, target: impl Into<Target>, data: &Value) -> Result<Facade> {
        let uri = self.require_uri(&target.into(), "PATCH")?;
        self.update(uri, data.clone()).await
    }

    /// Delete the entity at `target`.
    ///
    /// Resolves once every cached entity referencing it has been reloaded
    /// and the entry itself is purged.
    pub async fn delete(&self, target: impl Into<Target>) -> Result<()> {
        let uri = self.require_uri(&target.into(), "DELETE")?;
        let cache = self.clone();
        join(tokio::spawn(async move { cache.remove(uri).await })).await
    }

    /// Drop one entry from the table without touching the API.
    ///
    /// Targets without a URI are ignored.
    pub fn purge(&self, target: impl Into<Target>) {
        if let Some(uri) = normalize_entity_uri(&target.into(), &self.inner.config.api_root) {
            self.inner.store.purge(&uri);
        }
    }

    /// Drop every entry from the table.
    pub fn purge_all(&self) {
        self.inner.store.purge_all();
    }

    /// Absolute URL behind `relation` of the entity at `target`.
    ///
    /// Waits for the entity to load. Templated links are expanded with
    /// `params`. Returns `None` when the entity has no such link.
    pub async fn href(
        &self,
        target: impl Into<Target>,
        relation: &str,
        params: &TemplateParams,
    ) -> Result<Option<String>> {
        let facade = self.get(target)?;
        let Some(loaded) = facade.loaded().await? else {
            return Ok(None);
        };
        let Some(link) = loaded
            .snapshot()
            .and_then(|s| s.field(relation))
            .and_then(Link::from_reference)
        else {
            return Ok(None);
        };

        let href = if link.templated {
            self.inner.expander.expand(&link.href, params)
        } else {
            link.href
        };
        let root = &self.inner.config.api_root;
        if href.starts_with(root.as_str()) && !root.is_empty() {
            Ok(Some(href))
        } else {
            Ok(Some(format!("{root}{href}")))
        }
    }

    pub(crate) fn canonical(&self, uri: &str) -> String {
        normalize_uri(uri, &self.inner.config.api_root)
    }

    pub(crate) fn url(&self, uri: &str) -> String {
        format!("{}{}", self.inner.config.api_root, uri)
    }

    pub(crate) fn expander(&self) -> &dyn TemplateExpander {
        self.inner.expander.as_ref()
    }

    pub(crate) fn avoids_n_plus_one(&self) -> bool {
        self.inner.config.avoid_n_plus_one_requests
    }

    pub(crate) fn wrap(&self, snapshot: Snapshot, handle: Option<LoadHandle>) -> Facade {
        facade::wrap(self.clone(), snapshot, handle)
    }

    fn require_uri(&self, target: &Target, operation: &'static str) -> Result<String> {
        normalize_entity_uri(target, &self.inner.config.api_root).ok_or_else(|| {
            HalCacheError::Unidentifiable {
                operation,
                value: target.describe(),
            }
        })
    }
}

/// Await a spawned operation, surfacing a cancelled or panicked task.
async fn join<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    task.await
        .unwrap_or_else(|e| Err(HalCacheError::Task(e.to_string())))
}

/// Record request outcome metrics (counter + histogram).
fn record_request(operation: &'static str, start: Instant, result: &TransportResult) {
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(telemetry::FETCHES_TOTAL,
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::FETCH_DURATION_SECONDS,
        "operation" => operation,
    )
    .record(start.elapsed().as_secs_f64());
}
