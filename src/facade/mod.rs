//! Lazy facades over cache snapshots.
//!
//! [`Facade`] is what callers hold: a [`Resource`] or [`Collection`] when
//! data is present, a [`LoadingResource`] placeholder while a fetch is
//! outstanding. Both expose the same navigation surface (relations, items,
//! find/map/filter), so callers do not branch on loading state.

mod collection;
mod loading;
mod resource;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use serde_json::Value;

use crate::HalCache;
use crate::Result;
use crate::hal::TemplateParams;
use crate::store::LoadHandle;
use crate::types::{Meta, Snapshot};

pub use collection::Collection;
pub use loading::{LoadingItems, LoadingResource};
pub use resource::Resource;

/// An entity or collection as seen by calling code.
#[derive(Debug, Clone)]
pub enum Facade {
    Resource(Resource),
    Collection(Collection),
    Loading(LoadingResource),
}

impl Facade {
    pub fn self_uri(&self) -> Option<&str> {
        match self {
            Facade::Resource(r) => Some(r.self_uri()),
            Facade::Collection(c) => Some(c.self_uri()),
            Facade::Loading(l) => l.self_uri(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Facade::Loading(_))
    }

    pub fn meta(&self) -> Meta {
        match self {
            Facade::Resource(r) => r.meta(),
            Facade::Collection(c) => c.meta(),
            Facade::Loading(_) => Meta {
                loading: true,
                ..Meta::default()
            },
        }
    }

    /// Snapshot behind a loaded facade.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.as_resource().map(Resource::snapshot)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.as_resource().and_then(|r| r.property(name))
    }

    /// Follow link `name`. On a placeholder this always returns a further
    /// placeholder, which resolves to `None` if the link turns out missing.
    pub fn relation(&self, name: &str) -> Option<Facade> {
        self.relation_with(name, &TemplateParams::new())
    }

    pub fn relation_with(&self, name: &str, params: &TemplateParams) -> Option<Facade> {
        match self {
            Facade::Resource(r) => r.relation_with(name, params),
            Facade::Collection(c) => c.relation_with(name, params),
            Facade::Loading(l) => Some(Facade::Loading(l.relation_with(name, params))),
        }
    }

    /// Items of a collection; empty for plain entities.
    pub fn items(&self) -> Items {
        match self {
            Facade::Resource(_) => Items::Loaded(Vec::new()),
            Facade::Collection(c) => c.items(),
            Facade::Loading(l) => Items::Loading(l.items()),
        }
    }

    /// Resolves once outstanding loads of this entity have finished.
    pub fn loaded(&self) -> BoxFuture<'static, Result<Option<Facade>>> {
        match self {
            Facade::Resource(r) => r.loaded(),
            Facade::Collection(c) => c.loaded(),
            Facade::Loading(l) => l.loaded(),
        }
    }

    /// The entity part of a loaded facade (collections included).
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Facade::Resource(r) => Some(r),
            Facade::Collection(c) => Some(&**c),
            Facade::Loading(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Facade::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_loading(&self) -> Option<&LoadingResource> {
        match self {
            Facade::Loading(l) => Some(l),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Option<Value> {
        self.as_resource().map(Resource::to_value)
    }
}

/// A list of facades, present or still loading.
#[derive(Debug, Clone)]
pub enum Items {
    Loaded(Vec<Facade>),
    Loading(LoadingItems),
}

impl Items {
    pub fn is_loading(&self) -> bool {
        matches!(self, Items::Loading(_))
    }

    /// Items already available; empty while loading.
    pub fn as_slice(&self) -> &[Facade] {
        match self {
            Items::Loaded(items) => items.as_slice(),
            Items::Loading(_) => &[],
        }
    }

    /// First item matching `predicate`.
    ///
    /// While loading, returns a placeholder that resolves to the match, or
    /// to `None` when nothing matches.
    pub fn find<F>(&self, predicate: F) -> Option<Facade>
    where
        F: Fn(&Facade) -> bool + Send + 'static,
    {
        match self {
            Items::Loaded(items) => items.iter().find(|item| predicate(item)).cloned(),
            Items::Loading(loading) => Some(Facade::Loading(loading.find(predicate))),
        }
    }

    pub fn filter<F>(self, predicate: F) -> Items
    where
        F: Fn(&Facade) -> bool + Send + 'static,
    {
        match self {
            Items::Loaded(items) => {
                Items::Loaded(items.into_iter().filter(|item| predicate(item)).collect())
            }
            Items::Loading(loading) => Items::Loading(loading.filter(predicate)),
        }
    }

    pub fn map<F>(self, f: F) -> Items
    where
        F: Fn(Facade) -> Facade + Send + 'static,
    {
        match self {
            Items::Loaded(items) => Items::Loaded(items.into_iter().map(f).collect()),
            Items::Loading(loading) => Items::Loading(loading.map(f)),
        }
    }

    pub fn flat_map<F>(self, f: F) -> Items
    where
        F: Fn(Facade) -> Vec<Facade> + Send + 'static,
    {
        match self {
            Items::Loaded(items) => Items::Loaded(items.into_iter().flat_map(f).collect()),
            Items::Loading(loading) => Items::Loading(loading.flat_map(f)),
        }
    }

    /// All items once available.
    pub fn loaded(self) -> BoxFuture<'static, Result<Vec<Facade>>> {
        match self {
            Items::Loaded(items) => future::ready(Ok(items)).boxed(),
            Items::Loading(loading) => loading.loaded(),
        }
    }
}

/// Wrap a table entry: a placeholder while it is loading, data otherwise.
pub(crate) fn wrap(cache: HalCache, snapshot: Snapshot, handle: Option<LoadHandle>) -> Facade {
    if !snapshot.meta().loading {
        return wrap_data(cache, snapshot, handle);
    }

    let self_uri = snapshot.self_uri().to_string();
    let load = match handle {
        Some(handle) => handle
            .map(move |result| result.map(|snapshot| Some(wrap_data(cache, snapshot, None))))
            .boxed(),
        None => future::ready(Ok(Some(wrap_data(cache, snapshot, None)))).boxed(),
    };
    Facade::Loading(LoadingResource::new(Some(self_uri), load))
}

pub(crate) fn wrap_data(cache: HalCache, snapshot: Snapshot, handle: Option<LoadHandle>) -> Facade {
    let resource = Resource::new(cache, snapshot, handle);
    if resource.snapshot().is_collection() {
        Facade::Collection(Collection::new(resource))
    } else {
        Facade::Resource(resource)
    }
}
