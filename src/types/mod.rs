//! Public types for the hal-cache data model.

mod link;
mod snapshot;
mod target;

pub use link::Link;
pub use snapshot::{Meta, ReloadHint, Snapshot, SnapshotKind};
pub use target::{Target, normalize_entity_uri, normalize_uri};
