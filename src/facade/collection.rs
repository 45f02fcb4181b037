use std::ops::Deref;

use futures_util::FutureExt;
use tracing::debug;

use super::{Facade, Items, LoadingResource, Resource};
use crate::types::{Link, Target};

/// A collection whose item list is available.
///
/// Dereferences to [`Resource`] for the collection's own fields and links.
#[derive(Debug, Clone)]
pub struct Collection {
    resource: Resource,
}

impl Deref for Collection {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.resource
    }
}

impl Collection {
    pub(crate) fn new(resource: Resource) -> Self {
        Self { resource }
    }

    pub fn links(&self) -> &[Link] {
        self.snapshot().items().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.links().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links().is_empty()
    }

    /// One facade per item, in order.
    ///
    /// For an embedded collection whose items are not all cached, the owner
    /// is reloaded once (when configured to avoid N+1 requests) and the
    /// unknown items are returned as placeholders resolving after that
    /// reload, instead of fetching every item on its own.
    pub fn items(&self) -> Items {
        let cache = self.cache();
        let links = self.links();
        let needs_owner_reload = cache.avoids_n_plus_one()
            && self.snapshot().reload_hint().is_some()
            && links.iter().any(|link| cache.is_unknown(&link.href));

        if needs_owner_reload {
            match cache.start_reload(&Target::from(self.snapshot())) {
                Ok(reload) => {
                    debug!(uri = self.self_uri(), "reloading owner for unknown items");
                    let reload = reload.map(|result| result.map(|_| ())).boxed().shared();
                    let items = links
                        .iter()
                        .filter_map(|link| {
                            if !cache.is_unknown(&link.href) {
                                return cache.get(link.href.as_str()).ok();
                            }
                            let cache = cache.clone();
                            let href = link.href.clone();
                            let reload = reload.clone();
                            let load = async move {
                                reload.await?;
                                cache.get(href)?.loaded().await
                            };
                            Some(Facade::Loading(LoadingResource::new(
                                Some(link.href.clone()),
                                load.boxed(),
                            )))
                        })
                        .collect();
                    return Items::Loaded(items);
                }
                Err(err) => debug!(error = %err, "owner reload not started"),
            }
        }

        Items::Loaded(
            links
                .iter()
                .filter_map(|link| cache.get(link.href.as_str()).ok())
                .collect(),
        )
    }
}
