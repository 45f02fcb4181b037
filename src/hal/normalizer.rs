//! HAL+JSON normalizer.
//!
//! Flattens one API document, with all its `_embedded` resources, into a
//! URI-keyed table of [`Normalized`] entries ready to be merged into the
//! store.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::{Link, ReloadHint};
use crate::{HalCacheError, Result};

/// Key under which an embedded list is kept inline as a collection.
pub const ITEMS_KEY: &str = "items";

/// One flattened resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub self_uri: String,
    pub fields: Map<String, Value>,
    /// Set for embedded collections, which are refreshed through their owner.
    pub reload: Option<ReloadHint>,
}

/// Result of normalizing one document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    /// Canonical self URI of the top-level resource.
    pub root: String,
    pub entities: BTreeMap<String, Normalized>,
}

/// Turns a raw API document into flat, URI-keyed entries.
///
/// `canonicalize` maps every href found in the document to the form used as
/// a table key.
pub trait Normalizer: Send + Sync {
    fn normalize(
        &self,
        document: &Value,
        canonicalize: &dyn Fn(&str) -> String,
    ) -> Result<NormalizedDocument>;
}

/// Default [`Normalizer`] for HAL+JSON.
///
/// - `_links.self.href` is the identity.
/// - other `_links` become `{href}` fields (`{href, templated}` for
///   templates); link arrays become arrays of `{href}`.
/// - a single `_embedded` resource is flattened and replaced by `{href}`.
///   One that carries nothing but its self link is only a reference and is
///   not emitted, so it cannot clobber real data.
/// - an `_embedded` array named `items` stays inline as the collection's
///   item list.
/// - any other `_embedded` array becomes a standalone collection at
///   `<owner>#<relation>`, reloadable through its owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalNormalizer;

impl Normalizer for HalNormalizer {
    fn normalize(
        &self,
        document: &Value,
        canonicalize: &dyn Fn(&str) -> String,
    ) -> Result<NormalizedDocument> {
        let obj = document.as_object().ok_or_else(|| {
            HalCacheError::InvalidResponse("document is not a JSON object".to_string())
        })?;
        let mut entities = BTreeMap::new();
        let root = flatten(obj, &mut entities, canonicalize)?.ok_or_else(|| {
            HalCacheError::InvalidResponse("document has no self link".to_string())
        })?;
        Ok(NormalizedDocument { root, entities })
    }
}

fn self_href(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("_links")?.get("self")?.get("href")?.as_str()
}

/// Only a self link, nothing else.
fn is_bare_reference(obj: &Map<String, Value>) -> bool {
    obj.len() == 1
        && obj
            .get("_links")
            .and_then(Value::as_object)
            .is_some_and(|links| links.len() == 1 && links.contains_key("self"))
}

fn link_field(value: &Value, canonicalize: &dyn Fn(&str) -> String) -> Option<Value> {
    let link = Link::from_value(value)?;
    // templates are expanded later; sorting a `{?query}` would mangle them
    let link = if link.templated {
        link
    } else {
        Link::new(canonicalize(&link.href))
    };
    Some(link.to_value())
}

/// Flatten `obj` into `out`, returning its canonical self URI.
///
/// Returns `Ok(None)` for objects without a self link; callers keep those
/// inline as plain data.
fn flatten(
    obj: &Map<String, Value>,
    out: &mut BTreeMap<String, Normalized>,
    canonicalize: &dyn Fn(&str) -> String,
) -> Result<Option<String>> {
    let Some(href) = self_href(obj) else {
        return Ok(None);
    };
    let self_uri = canonicalize(href);
    let mut fields = Map::new();

    for (key, value) in obj {
        if key != "_links" && key != "_embedded" {
            fields.insert(key.clone(), value.clone());
        }
    }

    if let Some(links) = obj.get("_links").and_then(Value::as_object) {
        for (rel, value) in links {
            if rel == "self" {
                continue;
            }
            let field = match value {
                Value::Array(entries) => Some(Value::Array(
                    entries
                        .iter()
                        .filter_map(|e| link_field(e, canonicalize))
                        .collect(),
                )),
                other => link_field(other, canonicalize),
            };
            if let Some(field) = field {
                fields.insert(rel.clone(), field);
            }
        }
    }

    if let Some(embedded) = obj.get("_embedded").and_then(Value::as_object) {
        for (rel, value) in embedded {
            let field = match value {
                Value::Object(child) => match embed_one(child, out, canonicalize)? {
                    Some(uri) => Link::new(uri).to_value(),
                    None => value.clone(),
                },
                Value::Array(children) => {
                    match embed_list(&self_uri, rel, children, out, canonicalize)? {
                        Some(field) => field,
                        None => value.clone(),
                    }
                }
                other => other.clone(),
            };
            fields.insert(rel.clone(), field);
        }
    }

    insert(
        out,
        Normalized {
            self_uri: self_uri.clone(),
            fields,
            reload: None,
        },
    );
    Ok(Some(self_uri))
}

fn embed_one(
    child: &Map<String, Value>,
    out: &mut BTreeMap<String, Normalized>,
    canonicalize: &dyn Fn(&str) -> String,
) -> Result<Option<String>> {
    match self_href(child) {
        Some(href) if is_bare_reference(child) => Ok(Some(canonicalize(href))),
        Some(_) => flatten(child, out, canonicalize),
        None => Ok(None),
    }
}

/// Returns the field value to store on the owner, or `None` when the list
/// holds plain data without identity and should stay inline.
fn embed_list(
    owner: &str,
    rel: &str,
    children: &[Value],
    out: &mut BTreeMap<String, Normalized>,
    canonicalize: &dyn Fn(&str) -> String,
) -> Result<Option<Value>> {
    let identified = children
        .iter()
        .all(|c| c.as_object().and_then(self_href).is_some());
    if !identified {
        return Ok(None);
    }

    let mut items = Vec::with_capacity(children.len());
    for child in children.iter().filter_map(Value::as_object) {
        if let Some(uri) = embed_one(child, out, canonicalize)? {
            items.push(Link::new(uri).to_value());
        }
    }

    if rel == ITEMS_KEY {
        return Ok(Some(Value::Array(items)));
    }

    let collection_uri = format!("{owner}#{rel}");
    let mut fields = Map::new();
    fields.insert(ITEMS_KEY.to_string(), Value::Array(items));
    insert(
        out,
        Normalized {
            self_uri: collection_uri.clone(),
            fields,
            reload: Some(ReloadHint {
                uri: owner.to_string(),
                property: rel.to_string(),
            }),
        },
    );
    Ok(Some(Link::new(collection_uri).to_value()))
}

/// Resources embedded more than once in a document are merged field-wise.
fn insert(out: &mut BTreeMap<String, Normalized>, entry: Normalized) {
    match out.get_mut(&entry.self_uri) {
        Some(existing) => {
            existing.fields.extend(entry.fields);
            if entry.reload.is_some() {
                existing.reload = entry.reload;
            }
        }
        None => {
            out.insert(entry.self_uri.clone(), entry);
        }
    }
}
