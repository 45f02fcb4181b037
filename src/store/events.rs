//! Change notifications for presentation layers.
//!
//! Every table mutation publishes a [`StoreEvent`] on a broadcast channel
//! after the mutation is complete, so a subscriber that re-reads the table
//! on an event never observes a half-applied change. Attaching a pending
//! load handle is not a mutation and publishes nothing.

/// A visible change to the cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An empty placeholder was inserted.
    Added { uri: String },
    /// Normalized data was merged for these URIs.
    Merged { uris: Vec<String> },
    /// `loading`, `reloading` or `deleting` changed.
    FlagsChanged { uri: String },
    /// The entry was removed.
    Purged { uri: String },
    /// Every entry was removed.
    Cleared,
}

impl StoreEvent {
    /// Whether this event concerns `uri`.
    pub fn affects(&self, uri: &str) -> bool {
        match self {
            StoreEvent::Added { uri: u }
            | StoreEvent::FlagsChanged { uri: u }
            | StoreEvent::Purged { uri: u } => u == uri,
            StoreEvent::Merged { uris } => uris.iter().any(|u| u == uri),
            StoreEvent::Cleared => true,
        }
    }
}
