//! URI canonicalization for everything callers may pass as "an entity".

use url::form_urlencoded;

use super::{ReloadHint, Snapshot};
use crate::facade::{Collection, Facade, LoadingResource, Resource};

/// Something that identifies an entity: a URI, a facade, or a snapshot.
#[derive(Debug, Clone)]
pub enum Target {
    Uri(String),
    Facade(Facade),
    Snapshot(Snapshot),
}

impl Target {
    /// The raw self URI before canonicalization, if the target carries one.
    pub fn raw_uri(&self) -> Option<&str> {
        match self {
            Target::Uri(uri) => Some(uri),
            Target::Facade(facade) => facade.self_uri(),
            Target::Snapshot(snapshot) => Some(snapshot.self_uri()),
        }
    }

    /// Reload hint when the target is an embedded collection.
    pub fn reload_hint(&self) -> Option<&ReloadHint> {
        match self {
            Target::Uri(_) => None,
            Target::Facade(facade) => facade.snapshot().and_then(Snapshot::reload_hint),
            Target::Snapshot(snapshot) => snapshot.reload_hint(),
        }
    }

    /// Short description used in identification errors.
    pub fn describe(&self) -> String {
        match self {
            Target::Uri(uri) => uri.clone(),
            Target::Facade(Facade::Loading(_)) => "[loading resource]".to_string(),
            Target::Facade(facade) => facade.self_uri().unwrap_or("[resource]").to_string(),
            Target::Snapshot(snapshot) => snapshot.self_uri().to_string(),
        }
    }
}

impl From<&str> for Target {
    fn from(uri: &str) -> Self {
        Target::Uri(uri.to_string())
    }
}

impl From<String> for Target {
    fn from(uri: String) -> Self {
        Target::Uri(uri)
    }
}

impl From<&String> for Target {
    fn from(uri: &String) -> Self {
        Target::Uri(uri.clone())
    }
}

impl From<Facade> for Target {
    fn from(facade: Facade) -> Self {
        Target::Facade(facade)
    }
}

impl From<&Facade> for Target {
    fn from(facade: &Facade) -> Self {
        Target::Facade(facade.clone())
    }
}

impl From<&Resource> for Target {
    fn from(resource: &Resource) -> Self {
        Target::Facade(Facade::Resource(resource.clone()))
    }
}

impl From<&Collection> for Target {
    fn from(collection: &Collection) -> Self {
        Target::Facade(Facade::Collection(collection.clone()))
    }
}

impl From<&LoadingResource> for Target {
    fn from(loading: &LoadingResource) -> Self {
        Target::Facade(Facade::Loading(loading.clone()))
    }
}

impl From<Snapshot> for Target {
    fn from(snapshot: Snapshot) -> Self {
        Target::Snapshot(snapshot)
    }
}

impl From<&Snapshot> for Target {
    fn from(snapshot: &Snapshot) -> Self {
        Target::Snapshot(snapshot.clone())
    }
}

/// Canonicalize a target into a root-relative URI.
///
/// Returns `None` when the target carries no URI at all (e.g. a placeholder
/// produced by a `find` that has not resolved yet).
pub fn normalize_entity_uri(target: &Target, api_root: &str) -> Option<String> {
    target.raw_uri().map(|uri| normalize_uri(uri, api_root))
}

/// Strip the API root prefix and sort query parameters by key.
///
/// Values of repeated keys keep their relative order; a fragment is carried
/// over untouched.
pub fn normalize_uri(uri: &str, api_root: &str) -> String {
    let relative = match uri.strip_prefix(api_root) {
        Some(rest) if !api_root.is_empty() => rest,
        _ => uri,
    };

    let (without_fragment, fragment) = match relative.find('#') {
        Some(pos) => relative.split_at(pos),
        None => (relative, ""),
    };

    let Some((path, query)) = without_fragment.split_once('?') else {
        return relative.to_string();
    };

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return format!("{path}{fragment}");
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let sorted = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{sorted}{fragment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_api_root() {
        assert_eq!(
            normalize_uri("https://api.example.com/books/1", "https://api.example.com"),
            "/books/1"
        );
    }

    #[test]
    fn leaves_foreign_uris_alone() {
        assert_eq!(
            normalize_uri("/books/1", "https://api.example.com"),
            "/books/1"
        );
    }

    #[test]
    fn root_uri_is_empty() {
        assert_eq!(normalize_uri("https://api.example.com", "https://api.example.com"), "");
    }

    #[test]
    fn sorts_query_parameters() {
        assert_eq!(normalize_uri("/books?page=2&author=1", ""), "/books?author=1&page=2");
    }

    #[test]
    fn keeps_repeated_key_order() {
        assert_eq!(normalize_uri("/books?tag=b&a=1&tag=a", ""), "/books?a=1&tag=b&tag=a");
    }

    #[test]
    fn drops_empty_query() {
        assert_eq!(normalize_uri("/books?", ""), "/books");
    }

    #[test]
    fn keeps_fragment() {
        assert_eq!(normalize_uri("/books/1#chapters", ""), "/books/1#chapters");
        assert_eq!(normalize_uri("/books?b=1&a=2#x", ""), "/books?a=2&b=1#x");
    }

    #[test]
    fn snapshot_target_uses_self_uri() {
        let target = Target::from(Snapshot::placeholder("/books/1?b=1&a=1"));
        assert_eq!(
            normalize_entity_uri(&target, "").as_deref(),
            Some("/books/1?a=1&b=1")
        );
    }
}
