use std::fmt;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use serde_json::{Map, Value};

use super::{Facade, Items, wrap_data};
use crate::HalCache;
use crate::Result;
use crate::hal::TemplateParams;
use crate::store::LoadHandle;
use crate::types::{Link, Meta, Snapshot};

/// An entity whose data is available.
///
/// Scalar and embedded fields are read with [`property`](Self::property).
/// Link fields are followed lazily with [`relation`](Self::relation): the
/// related entity is only requested when the accessor is called.
#[derive(Clone)]
pub struct Resource {
    cache: HalCache,
    snapshot: Snapshot,
    handle: Option<LoadHandle>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("self_uri", &self.snapshot.self_uri())
            .field("meta", &self.snapshot.meta())
            .field("pending", &self.handle.is_some())
            .finish()
    }
}

impl Resource {
    pub(crate) fn new(cache: HalCache, snapshot: Snapshot, handle: Option<LoadHandle>) -> Self {
        Self {
            cache,
            snapshot,
            handle,
        }
    }

    pub fn self_uri(&self) -> &str {
        self.snapshot.self_uri()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn meta(&self) -> Meta {
        self.snapshot.meta()
    }

    /// Raw field value, links included.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.snapshot.field(name)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        self.snapshot.fields()
    }

    /// The link stored under `name`, if that field is a link. An object
    /// carrying `href` next to other keys is embedded data and does not count.
    pub fn link(&self, name: &str) -> Option<Link> {
        self.snapshot.field(name).and_then(Link::from_reference)
    }

    /// Follow the link stored under `name`.
    ///
    /// Templated links are expanded without parameters. Returns `None` when
    /// the field is absent or not a link.
    pub fn relation(&self, name: &str) -> Option<Facade> {
        self.relation_with(name, &TemplateParams::new())
    }

    /// Follow the link stored under `name`, expanding it with `params` if it
    /// is templated.
    pub fn relation_with(&self, name: &str, params: &TemplateParams) -> Option<Facade> {
        let link = self.link(name)?;
        let href = if link.templated {
            self.cache.expander().expand(&link.href, params)
        } else {
            link.href
        };
        self.cache.get(href).ok()
    }

    /// Follow every link in the array stored under `name`.
    pub fn relations(&self, name: &str) -> Option<Items> {
        let entries = self.snapshot.field(name)?.as_array()?;
        let facades = entries
            .iter()
            .filter_map(Link::from_reference)
            .filter_map(|link| self.cache.get(link.href).ok())
            .collect();
        Some(Items::Loaded(facades))
    }

    /// Resolves to the up-to-date facade once any outstanding load or reload
    /// of this entity has finished.
    pub fn loaded(&self) -> BoxFuture<'static, Result<Option<Facade>>> {
        let cache = self.cache.clone();
        match &self.handle {
            Some(handle) => handle
                .clone()
                .map(move |result| result.map(|snapshot| Some(wrap_data(cache, snapshot, None))))
                .boxed(),
            None => {
                let facade = wrap_data(cache, self.snapshot.clone(), None);
                future::ready(Ok(Some(facade))).boxed()
            }
        }
    }

    pub fn to_value(&self) -> Value {
        self.snapshot.to_value()
    }

    pub(crate) fn cache(&self) -> &HalCache {
        &self.cache
    }
}
