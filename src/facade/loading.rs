//! Placeholders for data that has not arrived yet.
//!
//! Every operation on a placeholder returns another placeholder whose future
//! is the original one followed by that operation, so navigation code can be
//! written once without checking whether the base data is loaded.

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use super::Facade;
use crate::Result;
use crate::hal::TemplateParams;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T>>>;

/// An entity that is still loading.
///
/// Resolves to `None` when the operation that produced it found nothing,
/// e.g. a [`LoadingItems::find`] without a match.
#[derive(Clone)]
pub struct LoadingResource {
    self_uri: Option<String>,
    load: SharedLoad<Option<Facade>>,
}

impl fmt::Debug for LoadingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingResource")
            .field("self_uri", &self.self_uri)
            .field("settled", &self.load.peek().is_some())
            .finish()
    }
}

impl LoadingResource {
    pub(crate) fn new(
        self_uri: Option<String>,
        load: BoxFuture<'static, Result<Option<Facade>>>,
    ) -> Self {
        Self {
            self_uri,
            load: load.shared(),
        }
    }

    /// URI of the entity, when known before it has loaded.
    pub fn self_uri(&self) -> Option<&str> {
        self.self_uri.as_deref()
    }

    /// Placeholder for the entity behind link `name`.
    pub fn relation(&self, name: &str) -> LoadingResource {
        self.relation_with(name, &TemplateParams::new())
    }

    pub fn relation_with(&self, name: &str, params: &TemplateParams) -> LoadingResource {
        let load = self.load.clone();
        let name = name.to_string();
        let params = params.clone();
        LoadingResource::new(
            None,
            async move {
                let Some(facade) = load.await? else {
                    return Ok(None);
                };
                match facade.relation_with(&name, &params) {
                    Some(related) => related.loaded().await,
                    None => Ok(None),
                }
            }
            .boxed(),
        )
    }

    /// Placeholder for the item list. Resolves to an empty list when the
    /// entity turns out not to be a collection.
    pub fn items(&self) -> LoadingItems {
        let load = self.load.clone();
        LoadingItems::new(
            async move {
                match load.await? {
                    Some(facade) => facade.items().loaded().await,
                    None => Ok(Vec::new()),
                }
            }
            .boxed(),
        )
    }

    pub fn loaded(&self) -> BoxFuture<'static, Result<Option<Facade>>> {
        self.load.clone().boxed()
    }

    /// The outcome, if it is already available.
    pub fn peek(&self) -> Option<Result<Option<Facade>>> {
        self.load.peek().cloned()
    }
}

/// An item list that is still loading.
#[derive(Clone)]
pub struct LoadingItems {
    load: SharedLoad<Vec<Facade>>,
}

impl fmt::Debug for LoadingItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingItems")
            .field("settled", &self.load.peek().is_some())
            .finish()
    }
}

impl LoadingItems {
    pub(crate) fn new(load: BoxFuture<'static, Result<Vec<Facade>>>) -> Self {
        Self {
            load: load.shared(),
        }
    }

    /// Placeholder for the first item matching `predicate`.
    pub fn find<F>(&self, predicate: F) -> LoadingResource
    where
        F: Fn(&Facade) -> bool + Send + 'static,
    {
        let load = self.load.clone();
        LoadingResource::new(
            None,
            async move {
                match load.await?.into_iter().find(|item| predicate(item)) {
                    Some(Facade::Loading(item)) => item.loaded().await,
                    Some(item) => Ok(Some(item)),
                    None => Ok(None),
                }
            }
            .boxed(),
        )
    }

    pub fn filter<F>(&self, predicate: F) -> LoadingItems
    where
        F: Fn(&Facade) -> bool + Send + 'static,
    {
        self.chain(move |items| items.into_iter().filter(|item| predicate(item)).collect())
    }

    pub fn map<F>(&self, f: F) -> LoadingItems
    where
        F: Fn(Facade) -> Facade + Send + 'static,
    {
        self.chain(move |items| items.into_iter().map(&f).collect())
    }

    pub fn flat_map<F>(&self, f: F) -> LoadingItems
    where
        F: Fn(Facade) -> Vec<Facade> + Send + 'static,
    {
        self.chain(move |items| items.into_iter().flat_map(&f).collect())
    }

    pub fn loaded(&self) -> BoxFuture<'static, Result<Vec<Facade>>> {
        self.load.clone().boxed()
    }

    pub fn peek(&self) -> Option<Result<Vec<Facade>>> {
        self.load.peek().cloned()
    }

    fn chain<F>(&self, apply: F) -> LoadingItems
    where
        F: FnOnce(Vec<Facade>) -> Vec<Facade> + Send + 'static,
    {
        let load = self.load.clone();
        LoadingItems::new(async move { load.await.map(apply) }.boxed())
    }
}
