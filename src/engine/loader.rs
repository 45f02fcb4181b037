//! Load coordinator.
//!
//! Decides for each request whether to serve the cached snapshot, reuse the
//! pending load already attached to the entry, or start a new fetch. At most
//! one fetch per URI is outstanding: the check and the attach happen inside
//! a single [`Store::commit`](crate::store::Store), so two callers racing on
//! the same URI cannot both start one.

use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{HalCache, record_request};
use crate::error::classify;
use crate::facade::Facade;
use crate::hal::NormalizedDocument;
use crate::store::{LoadHandle, Pending};
use crate::telemetry;
use crate::types::{Snapshot, Target, normalize_entity_uri};
use crate::{HalCacheError, Result};

impl HalCache {
    /// Current table entry for `uri` plus the handle that resolves to its
    /// up-to-date version. `None` means the entry is already settled.
    pub(crate) fn load(&self, uri: &str, force: bool) -> (Snapshot, Option<LoadHandle>) {
        self.inner.store.commit("load", |t| {
            let exists = t.contains(uri);
            if let Some(snapshot) = t.get(uri) {
                let meta = snapshot.meta();
                if meta.loading || (force && meta.reloading) {
                    trace!(uri, "joining in-flight load");
                    metrics::counter!(telemetry::DEDUP_HITS_TOTAL).increment(1);
                    return (snapshot.clone(), t.load_handle(uri));
                }
            }

            if !exists {
                t.add_empty(uri);
                t.loading(uri);
            } else if force {
                t.reloading(uri);
            }

            if !exists || force {
                let token = t.next_token();
                // spawned under the lock: the fetch cannot settle before its
                // handle is attached
                let handle = self.spawn_fetch(uri.to_string(), token, exists);
                t.attach(uri, Pending { token, handle });
            } else if t.pending(uri).is_some() {
                trace!(uri, "reusing attached load handle");
                metrics::counter!(telemetry::DEDUP_HITS_TOTAL).increment(1);
            }

            let snapshot = t
                .get(uri)
                .cloned()
                .unwrap_or_else(|| Snapshot::placeholder(uri));
            (snapshot, t.load_handle(uri))
        })
    }

    /// Start a forced reload of `target` without waiting for it.
    ///
    /// Everything up to issuing the request happens synchronously, so
    /// callers can start several reloads before awaiting any of them.
    ///
    /// A placeholder that has no URI yet resolves with its own pending load.
    pub(crate) fn start_reload(
        &self,
        target: &Target,
    ) -> Result<BoxFuture<'static, Result<Facade>>> {
        if let Some(hint) = target.reload_hint().cloned() {
            let owner = self.start_reload(&Target::Uri(hint.uri.clone()))?;
            return Ok(async move {
                let owner = owner.await?;
                let relation = owner.relation(&hint.property).ok_or_else(|| {
                    HalCacheError::InvalidResponse(format!(
                        "\"{}\" no longer embeds \"{}\"",
                        hint.uri, hint.property
                    ))
                })?;
                relation.loaded().await?.ok_or_else(|| {
                    HalCacheError::InvalidResponse(format!(
                        "\"{}\" of \"{}\" did not resolve",
                        hint.property, hint.uri
                    ))
                })
            }
            .boxed());
        }

        let Some(uri) = normalize_entity_uri(target, &self.inner.config.api_root) else {
            // a placeholder without a URI yet reloads as the load it already is
            let Target::Facade(Facade::Loading(loading)) = target else {
                return Err(HalCacheError::Unidentifiable {
                    operation: "GET",
                    value: target.describe(),
                });
            };
            let load = loading.loaded();
            return Ok(async move {
                load.await?.ok_or_else(|| {
                    HalCacheError::InvalidResponse("placeholder resolved to nothing".to_string())
                })
            }
            .boxed());
        };
        let (snapshot, handle) = self.load(&uri, true);
        let cache = self.clone();
        Ok(async move {
            let snapshot = match handle {
                Some(handle) => handle.await?,
                None => snapshot,
            };
            Ok(cache.wrap(snapshot, None))
        }
        .boxed())
    }

    /// Spawn the fetch for `uri` and return its shareable handle.
    fn spawn_fetch(&self, uri: String, token: u64, reloading: bool) -> LoadHandle {
        let cache = self.clone();
        into_handle(tokio::spawn(async move {
            cache.fetch(&uri, token, reloading).await
        }))
    }

    async fn fetch(&self, uri: &str, token: u64, reloading: bool) -> Result<Snapshot> {
        debug!(uri, reloading, "fetching");
        let start = Instant::now();
        let result = self.inner.transport.get(&self.url(uri)).await;
        record_request("get", start, &result);

        let outcome = match result {
            Ok(document) => self.merge_fetched(uri, token, document),
            Err(err) => Err(classify(uri, err)),
        };
        outcome.map_err(|err| {
            self.inner.store.commit("fetch_failed", |t| {
                if reloading {
                    t.reloading_failed(uri, token);
                } else {
                    t.loading_failed(uri, token);
                }
            });
            self.handle_failure(uri, err)
        })
    }

    fn merge_fetched(&self, uri: &str, token: u64, mut document: Value) -> Result<Snapshot> {
        if self.inner.config.force_requested_self_link {
            force_self_link(&mut document, uri);
        }
        let NormalizedDocument { root, entities } = self.normalize(&document)?;
        let snapshot = self.inner.store.commit("merge", |t| {
            let merged = t.add(entities);
            if !merged.iter().any(|u| u == uri) {
                warn!(uri, root = %root, "response self link differs from requested URI");
            }
            t.settle(uri, token);
            t.get(uri).cloned()
        });
        debug!(uri, "merged");
        Ok(snapshot.unwrap_or_else(|| Snapshot::placeholder(uri)))
    }

    pub(super) fn normalize(&self, document: &Value) -> Result<NormalizedDocument> {
        let canonicalize = |href: &str| self.canonical(href);
        self.inner.normalizer.normalize(document, &canonicalize)
    }

    /// Side effects of a failed request on `uri`, returning the error to
    /// hand to the caller.
    ///
    /// A gone resource is marked deleting and cleaned up in the background;
    /// the caller is not held up by the cascade.
    pub(super) fn handle_failure(&self, uri: &str, err: HalCacheError) -> HalCacheError {
        if err.is_gone() {
            warn!(uri, "resource is gone, cleaning up");
            self.inner.store.deleting(uri);
            let cache = self.clone();
            let uri = uri.to_string();
            tokio::spawn(async move { cache.deleted(&uri).await });
        } else {
            debug!(uri, error = %err, "request failed");
        }
        err
    }
}

/// Rewrite the document's self link to `uri`.
pub(super) fn force_self_link(document: &mut Value, uri: &str) {
    let Some(obj) = document.as_object_mut() else {
        return;
    };
    let links = obj.entry("_links").or_insert_with(|| json!({}));
    if let Some(links) = links.as_object_mut() {
        links.insert("self".to_string(), json!({ "href": uri }));
    }
}

pub(super) fn into_handle(task: JoinHandle<Result<Snapshot>>) -> LoadHandle {
    task.map(|joined| joined.unwrap_or_else(|e| Err(HalCacheError::Task(e.to_string()))))
        .boxed()
        .shared()
}
