//! Mutation engine: create, update, delete and delete completion.

use std::time::Instant;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::loader::{force_self_link, into_handle};
use super::{HalCache, record_request};
use crate::error::classify;
use crate::facade::Facade;
use crate::store::Pending;
use crate::telemetry;
use crate::types::{Snapshot, Target};
use crate::Result;

impl HalCache {
    pub(super) async fn create(&self, uri: String, body: Value) -> Result<Facade> {
        debug!(uri, "creating");
        let start = Instant::now();
        let result = self.inner.transport.post(&self.url(&uri), &body).await;
        record_request("post", start, &result);

        let document = result.map_err(|e| self.handle_failure(&uri, classify(&uri, e)))?;
        let normalized = self.normalize(&document)?;
        let root = normalized.root.clone();
        self.inner
            .store
            .commit("create", |t| t.add(normalized.entities));
        info!(collection = uri, created = root, "created");
        self.get(root)
    }

    /// PATCH `uri`. An unknown entity gets a loading placeholder for the
    /// duration of the request so it can already be navigated.
    pub(super) async fn update(&self, uri: String, body: Value) -> Result<Facade> {
        debug!(uri, "updating");
        let handle = self.inner.store.commit("update", |t| {
            let token = (!t.contains(&uri)).then(|| {
                t.add_empty(&uri);
                t.loading(&uri);
                t.next_token()
            });
            let cache = self.clone();
            let task_uri = uri.clone();
            let handle = into_handle(tokio::spawn(async move {
                cache.send_patch(task_uri, body, token).await
            }));
            // the placeholder waits on the patch itself, not on a separate GET
            if let Some(token) = token {
                t.attach(
                    &uri,
                    Pending {
                        token,
                        handle: handle.clone(),
                    },
                );
            }
            handle
        });
        handle.await?;
        self.get(uri)
    }

    async fn send_patch(&self, uri: String, body: Value, token: Option<u64>) -> Result<Snapshot> {
        let start = Instant::now();
        let result = self.inner.transport.patch(&self.url(&uri), &body).await;
        record_request("patch", start, &result);

        let outcome = match result {
            Ok(document) => self.merge_patched(&uri, document, token),
            Err(err) => Err(classify(&uri, err)),
        };
        outcome.map_err(|err| {
            if let Some(token) = token {
                self.inner
                    .store
                    .commit("patch_failed", |t| t.discard_placeholder(&uri, token));
            }
            self.handle_failure(&uri, err)
        })
    }

    fn merge_patched(&self, uri: &str, mut document: Value, token: Option<u64>) -> Result<Snapshot> {
        if self.inner.config.force_requested_self_link {
            force_self_link(&mut document, uri);
        }
        let normalized = self.normalize(&document)?;
        let snapshot = self.inner.store.commit("patch", |t| {
            t.add(normalized.entities);
            if let Some(token) = token {
                t.settle(uri, token);
            }
            t.get(uri).cloned()
        });
        Ok(snapshot.unwrap_or_else(|| Snapshot::placeholder(uri)))
    }

    /// DELETE `uri`, then run delete completion.
    ///
    /// A 404/410 answer means the entity is already gone, which is what was
    /// asked for: completion runs and the delete succeeds.
    pub(super) async fn remove(&self, uri: String) -> Result<()> {
        debug!(uri, "deleting");
        self.inner.store.deleting(&uri);
        let start = Instant::now();
        let result = self.inner.transport.delete(&self.url(&uri)).await;
        record_request("delete", start, &result);

        match result.map_err(|e| classify(&uri, e)) {
            Ok(_) => {}
            Err(err) if err.is_gone() => {
                debug!(uri, "already gone on the server");
            }
            Err(err) => {
                warn!(uri, error = %err, "delete failed");
                self.inner.store.deleting_failed(&uri);
                return Err(err);
            }
        }
        self.deleted(&uri).await;
        info!(uri, "deleted");
        Ok(())
    }

    /// Delete completion for `uri`.
    ///
    /// Force-reloads every entity referencing `uri`, except those being
    /// deleted themselves (mutually referencing entities would otherwise
    /// reload each other forever). All reloads start before any is awaited;
    /// their failures are ignored. The entry is purged once all settled.
    pub(crate) async fn deleted(&self, uri: &str) {
        let referencing: Vec<Snapshot> = self
            .inner
            .store
            .referencing(uri)
            .into_iter()
            .filter(|s| !s.meta().deleting)
            .collect();

        let reloads: Vec<_> = referencing
            .iter()
            .filter_map(|snapshot| {
                metrics::counter!(telemetry::CASCADE_RELOADS_TOTAL).increment(1);
                match self.start_reload(&Target::from(snapshot)) {
                    Ok(reload) => Some(reload),
                    Err(err) => {
                        debug!(uri = snapshot.self_uri(), error = %err, "cascade reload not started");
                        None
                    }
                }
            })
            .collect();

        if !reloads.is_empty() {
            debug!(uri, count = reloads.len(), "reloading referencing entities");
        }
        for result in join_all(reloads).await {
            if let Err(err) = result {
                debug!(uri, error = %err, "ignoring failed cascade reload");
            }
        }

        self.inner.store.purge(uri);
    }
}
