//! Entity cache store.
//!
//! The URI-keyed table of snapshots plus per-entry lifecycle state. All
//! mutation goes through [`Store::commit`], which runs a closure against the
//! [`Table`] under one write lock and publishes the resulting
//! [`StoreEvent`]s only after the lock is released. Readers therefore never
//! see a half-merged entry, and several primitives can be combined into one
//! atomic step (the load coordinator relies on this for its
//! check-then-insert).
//!
//! Each entry may carry a pending load: a shared future that resolves to the
//! entry's snapshot once the fetch or mutation that owns it completes.
//! Pending loads are tagged with a token so that a completing operation only
//! clears state it owns; when two operations race on the same entry, the one
//! attached last owns the `loading`/`reloading` flags.

pub mod events;
mod lock;
pub mod scan;

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use futures_util::future::{BoxFuture, Shared};
use tokio::sync::broadcast;
use tracing::trace;

use crate::Result;
use crate::hal::Normalized;
use crate::telemetry;
use crate::types::Snapshot;

pub use events::StoreEvent;
use lock::{rw_read, rw_write};

/// Shared future resolving to an entry's up-to-date snapshot.
pub type LoadHandle = Shared<BoxFuture<'static, Result<Snapshot>>>;

/// A load handle together with the token of the operation that owns it.
#[derive(Clone)]
pub(crate) struct Pending {
    pub(crate) token: u64,
    pub(crate) handle: LoadHandle,
}

struct Entry {
    snapshot: Snapshot,
    pending: Option<Pending>,
}

/// The cache table, as seen inside [`Store::commit`].
#[derive(Default)]
pub struct Table {
    entries: HashMap<String, Entry>,
    events: Vec<StoreEvent>,
    next_token: u64,
}

impl Table {
    pub fn get(&self, uri: &str) -> Option<&Snapshot> {
        self.entries.get(uri).map(|e| &e.snapshot)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.values().map(|e| &e.snapshot)
    }

    /// Handle of the pending operation on `uri`, if one is attached.
    pub fn load_handle(&self, uri: &str) -> Option<LoadHandle> {
        self.pending(uri).map(|p| p.handle.clone())
    }

    pub(crate) fn pending(&self, uri: &str) -> Option<&Pending> {
        self.entries.get(uri).and_then(|e| e.pending.as_ref())
    }

    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Insert an empty placeholder so navigation has something to attach a
    /// pending load to. No-op if the URI is already present.
    pub(crate) fn add_empty(&mut self, uri: &str) {
        if self.entries.contains_key(uri) {
            return;
        }
        self.entries.insert(
            uri.to_string(),
            Entry {
                snapshot: Snapshot::placeholder(uri),
                pending: None,
            },
        );
        self.events.push(StoreEvent::Added {
            uri: uri.to_string(),
        });
    }

    pub(crate) fn loading(&mut self, uri: &str) {
        self.set_flags(uri, |m| m.loading = true);
    }

    pub(crate) fn reloading(&mut self, uri: &str) {
        self.set_flags(uri, |m| m.reloading = true);
    }

    pub(crate) fn deleting(&mut self, uri: &str) {
        self.set_flags(uri, |m| m.deleting = true);
    }

    pub(crate) fn deleting_failed(&mut self, uri: &str) {
        self.set_flags(uri, |m| m.deleting = false);
    }

    /// Initial load failed: stop presenting the entry as loading but keep the
    /// rejected handle, so plain reads see the failure without refetching.
    pub(crate) fn loading_failed(&mut self, uri: &str, token: u64) {
        if self.owns(uri, token) {
            self.set_flags(uri, |m| m.loading = false);
        }
    }

    /// Forced reload failed: leave the entry retryable.
    pub(crate) fn reloading_failed(&mut self, uri: &str, token: u64) {
        if self.owns(uri, token) {
            self.set_flags(uri, |m| m.reloading = false);
        }
    }

    /// The operation identified by `token` completed and its data is merged.
    pub(crate) fn settle(&mut self, uri: &str, token: u64) {
        if !self.owns(uri, token) {
            return;
        }
        if let Some(entry) = self.entries.get_mut(uri) {
            entry.pending = None;
        }
        self.set_flags(uri, |m| {
            m.loading = false;
            m.reloading = false;
        });
    }

    /// Remove a placeholder that an aborted operation created, unless data
    /// arrived for it in the meantime.
    pub(crate) fn discard_placeholder(&mut self, uri: &str, token: u64) {
        let removable = self.owns(uri, token)
            && self.entries.get(uri).is_some_and(|e| e.snapshot.is_empty());
        if removable {
            self.purge(uri);
        }
    }

    /// Attach a pending load. Not a visible mutation: publishes nothing.
    pub(crate) fn attach(&mut self, uri: &str, pending: Pending) {
        if let Some(entry) = self.entries.get_mut(uri) {
            entry.pending = Some(pending);
        }
    }

    /// Merge a normalized table, overwriting entries in place.
    ///
    /// An entry may change between entity and collection. `deleting` and
    /// `reloading` survive the merge, as does a load handle that is still
    /// owned by an outstanding load or reload.
    pub(crate) fn add(&mut self, normalized: BTreeMap<String, Normalized>) -> Vec<String> {
        let mut uris = Vec::with_capacity(normalized.len());
        for (uri, data) in normalized {
            let mut snapshot = Snapshot::from_normalized(data);
            let pending = match self.entries.remove(&uri) {
                Some(old) => {
                    let old_meta = old.snapshot.meta();
                    let meta = snapshot.meta_mut();
                    meta.deleting = old_meta.deleting;
                    meta.reloading = old_meta.reloading;
                    if old_meta.loading || old_meta.reloading {
                        old.pending
                    } else {
                        None
                    }
                }
                None => None,
            };
            self.entries
                .insert(uri.clone(), Entry { snapshot, pending });
            uris.push(uri);
        }
        if !uris.is_empty() {
            self.events.push(StoreEvent::Merged { uris: uris.clone() });
        }
        uris
    }

    pub(crate) fn purge(&mut self, uri: &str) -> bool {
        let removed = self.entries.remove(uri).is_some();
        if removed {
            metrics::counter!(telemetry::PURGES_TOTAL).increment(1);
            self.events.push(StoreEvent::Purged {
                uri: uri.to_string(),
            });
        }
        removed
    }

    pub(crate) fn purge_all(&mut self) {
        metrics::counter!(telemetry::PURGES_TOTAL).increment(self.entries.len() as u64);
        self.entries.clear();
        self.events.push(StoreEvent::Cleared);
    }

    fn owns(&self, uri: &str, token: u64) -> bool {
        self.pending(uri).is_some_and(|p| p.token == token)
    }

    fn set_flags(&mut self, uri: &str, f: impl FnOnce(&mut crate::types::Meta)) {
        let Some(entry) = self.entries.get_mut(uri) else {
            return;
        };
        let before = entry.snapshot.meta();
        f(entry.snapshot.meta_mut());
        if entry.snapshot.meta() != before {
            self.events.push(StoreEvent::FlagsChanged {
                uri: uri.to_string(),
            });
        }
    }
}

/// Thread-safe owner of the [`Table`] and the change channel.
pub struct Store {
    table: RwLock<Table>,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Create an empty store whose change channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            table: RwLock::new(Table::default()),
            events,
        }
    }

    /// Apply one or more primitives atomically, then publish their events.
    pub(crate) fn commit<R>(&self, op: &'static str, f: impl FnOnce(&mut Table) -> R) -> R {
        let (result, events) = {
            let mut table = rw_write(&self.table, op);
            let result = f(&mut *table);
            (result, std::mem::take(&mut table.events))
        };
        for event in events {
            if self.events.send(event).is_err() {
                trace!(op, "no subscribers for store event");
            }
        }
        result
    }

    /// Read the table under a shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        let table = rw_read(&self.table, "read");
        f(&table)
    }

    pub fn get(&self, uri: &str) -> Option<Snapshot> {
        self.read(|t| t.get(uri).cloned())
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.read(|t| t.contains(uri))
    }

    pub fn len(&self) -> usize {
        self.read(Table::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot plus pending handle, read together.
    pub fn entry(&self, uri: &str) -> Option<(Snapshot, Option<LoadHandle>)> {
        self.read(|t| t.get(uri).map(|s| (s.clone(), t.load_handle(uri))))
    }

    /// Every entry referencing `uri`, as of now.
    pub fn referencing(&self, uri: &str) -> Vec<Snapshot> {
        self.read(|t| scan::find_referencing(t.snapshots(), uri))
    }

    pub(crate) fn deleting(&self, uri: &str) {
        self.commit("deleting", |t| t.deleting(uri));
    }

    pub(crate) fn deleting_failed(&self, uri: &str) {
        self.commit("deleting_failed", |t| t.deleting_failed(uri));
    }

    pub(crate) fn purge(&self, uri: &str) -> bool {
        self.commit("purge", |t| t.purge(uri))
    }

    pub(crate) fn purge_all(&self) {
        self.commit("purge_all", Table::purge_all);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
