//! hal-cache - URI-keyed entity cache for HAL+JSON hypermedia APIs
//!
//! This crate keeps a client-side table of API resources keyed by their self
//! URI. It deduplicates in-flight requests, merges every response (embedded
//! resources included) into the table, keeps referencing entities fresh when
//! something is deleted, and hands out facades that can be navigated before
//! the data has arrived.
//!
//! # Example
//!
//! ```rust,no_run
//! use hal_cache::HalCache;
//!
//! #[tokio::main]
//! async fn main() -> hal_cache::Result<()> {
//!     let api = HalCache::builder()
//!         .api_root("https://api.example.com")
//!         .build()?;
//!
//!     // returns immediately; a placeholder until the response arrives
//!     let book = api.get("/books/1")?;
//!
//!     // navigation works on placeholders too
//!     let author = book.relation("author");
//!
//!     if let Some(author) = author {
//!         if let Some(author) = author.loaded().await? {
//!             println!("{:?}", author.property("name"));
//!         }
//!     }
//!
//!     api.delete("/books/1").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod hal;
pub mod store;
pub mod telemetry;
pub mod traits;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use config::CacheConfig;
pub use engine::{HalCache, HalCacheBuilder};
pub use error::{HalCacheError, Result, ServerResponse, TransportError};
pub use facade::{Collection, Facade, Items, LoadingItems, LoadingResource, Resource};
pub use hal::{
    HalNormalizer, Normalized, NormalizedDocument, Normalizer, Rfc6570Expander, TemplateExpander,
    TemplateParams,
};
pub use store::{LoadHandle, Store, StoreEvent};
pub use traits::HypermediaApi;
pub use transport::{HttpTransport, Transport, TransportResult};
pub use types::{Link, Meta, ReloadHint, Snapshot, SnapshotKind, Target};
