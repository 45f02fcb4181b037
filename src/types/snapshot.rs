use serde_json::{Map, Value};

use super::Link;
use crate::hal::Normalized;

/// Lifecycle flags carried by every table entry.
///
/// `loading` and `reloading` are never meaningful together; `deleting` is
/// independent and may overlap a reload triggered while a delete settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    pub loading: bool,
    pub reloading: bool,
    pub deleting: bool,
}

/// Where an embedded collection came from.
///
/// An embedded list has no endpoint of its own; refreshing it means
/// reloading `uri` and reading `property` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadHint {
    pub uri: String,
    pub property: String,
}

/// Entity or collection, decided once when the entry is merged.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotKind {
    Entity,
    Collection {
        items: Vec<Link>,
        reload: Option<ReloadHint>,
    },
}

/// The cached representation of one entity or collection at its URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    self_uri: String,
    fields: Map<String, Value>,
    kind: SnapshotKind,
    meta: Meta,
}

impl Snapshot {
    /// An empty entry standing in for data that has not arrived yet.
    pub fn placeholder(uri: impl Into<String>) -> Self {
        Self {
            self_uri: uri.into(),
            fields: Map::new(),
            kind: SnapshotKind::Entity,
            meta: Meta::default(),
        }
    }

    /// Classify a normalized entry: an `items` array makes it a collection.
    pub fn from_normalized(normalized: Normalized) -> Self {
        let Normalized {
            self_uri,
            mut fields,
            reload,
        } = normalized;

        let kind = match fields.remove("items") {
            Some(Value::Array(entries)) => SnapshotKind::Collection {
                items: entries.iter().filter_map(Link::from_value).collect(),
                reload,
            },
            Some(other) => {
                fields.insert("items".to_string(), other);
                SnapshotKind::Entity
            }
            None => SnapshotKind::Entity,
        };

        Self {
            self_uri,
            fields,
            kind,
            meta: Meta::default(),
        }
    }

    pub fn self_uri(&self) -> &str {
        &self.self_uri
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn kind(&self) -> &SnapshotKind {
        &self.kind
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, SnapshotKind::Collection { .. })
    }

    /// Item links for collections, `None` for plain entities.
    pub fn items(&self) -> Option<&[Link]> {
        match &self.kind {
            SnapshotKind::Collection { items, .. } => Some(items),
            SnapshotKind::Entity => None,
        }
    }

    /// Reload hint for embedded collections.
    pub fn reload_hint(&self) -> Option<&ReloadHint> {
        match &self.kind {
            SnapshotKind::Collection { reload, .. } => reload.as_ref(),
            SnapshotKind::Entity => None,
        }
    }

    pub fn meta(&self) -> Meta {
        self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Whether any data has been merged into this entry yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.is_collection()
    }

    /// Render as JSON, with `items` and a `_meta` block restored.
    pub fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        if let Some(items) = self.items() {
            obj.insert(
                "items".to_string(),
                Value::Array(items.iter().map(Link::to_value).collect()),
            );
        }
        let mut meta = Map::new();
        meta.insert("self".to_string(), Value::String(self.self_uri.clone()));
        meta.insert("loading".to_string(), Value::Bool(self.meta.loading));
        meta.insert("reloading".to_string(), Value::Bool(self.meta.reloading));
        meta.insert("deleting".to_string(), Value::Bool(self.meta.deleting));
        obj.insert("_meta".to_string(), Value::Object(meta));
        Value::Object(obj)
    }
}
