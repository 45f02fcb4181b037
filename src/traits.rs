//! Core HypermediaApi trait

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::hal::TemplateParams;
use crate::{Facade, HalCache, Result, StoreEvent, Target};

/// The operations application code performs against a hypermedia API.
///
/// [`HalCache`] is the implementation; the trait exists so consumers can
/// depend on the operations rather than on the concrete cache.
#[async_trait]
pub trait HypermediaApi: Send + Sync {
    /// Cached entity or a loading placeholder. Never waits.
    fn get(&self, target: Target, force_reload: bool) -> Result<Facade>;

    /// Refetch and wait for the fresh data.
    async fn reload(&self, target: Target) -> Result<Facade>;

    /// Create an entity under a collection.
    async fn post(&self, target: Target, data: &Value) -> Result<Facade>;

    /// Update fields of an entity.
    async fn patch(&self, target: Target, data: &Value) -> Result<Facade>;

    /// Delete an entity and refresh everything that referenced it.
    async fn delete(&self, target: Target) -> Result<()>;

    /// Absolute URL behind a relation.
    async fn href(
        &self,
        target: Target,
        relation: &str,
        params: &TemplateParams,
    ) -> Result<Option<String>>;

    /// Drop an entry without touching the API.
    fn purge(&self, target: Target);

    /// Drop every entry.
    fn purge_all(&self);

    /// Whether the URI was never placed in the cache.
    fn is_unknown(&self, uri: &str) -> bool;

    /// Stream of table changes.
    fn changes(&self) -> Pin<Box<dyn Stream<Item = StoreEvent> + Send>>;
}

#[async_trait]
impl HypermediaApi for HalCache {
    fn get(&self, target: Target, force_reload: bool) -> Result<Facade> {
        self.get_with(target, force_reload)
    }

    async fn reload(&self, target: Target) -> Result<Facade> {
        HalCache::reload(self, target).await
    }

    async fn post(&self, target: Target, data: &Value) -> Result<Facade> {
        HalCache::post(self, target, data).await
    }

    async fn patch(&self, target: Target, data: &Value) -> Result<Facade> {
        HalCache::patch(self, target, data).await
    }

    async fn delete(&self, target: Target) -> Result<()> {
        HalCache::delete(self, target).await
    }

    async fn href(
        &self,
        target: Target,
        relation: &str,
        params: &TemplateParams,
    ) -> Result<Option<String>> {
        HalCache::href(self, target, relation, params).await
    }

    fn purge(&self, target: Target) {
        HalCache::purge(self, target);
    }

    fn purge_all(&self) {
        HalCache::purge_all(self);
    }

    fn is_unknown(&self, uri: &str) -> bool {
        HalCache::is_unknown(self, uri)
    }

    fn changes(&self) -> Pin<Box<dyn Stream<Item = StoreEvent> + Send>> {
        HalCache::changes(self)
    }
}
