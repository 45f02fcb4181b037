use serde_json::{Map, Value};

/// A hypermedia link as stored in a snapshot field.
///
/// Stored in the table as `{"href": ...}`, or `{"href": ..., "templated": true}`
/// for URI templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub href: String,
    pub templated: bool,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
        }
    }

    pub fn templated(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: true,
        }
    }

    /// Read a link out of a field value.
    ///
    /// Any object with a string `href` qualifies; extra keys are ignored here.
    /// Use [`is_reference_to`](crate::store::scan::is_reference_to) when an
    /// exact reference is required.
    pub fn from_value(value: &Value) -> Option<Link> {
        let obj = value.as_object()?;
        let href = obj.get("href")?.as_str()?;
        let templated = match obj.get("templated") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        };
        Some(Link {
            href: href.to_string(),
            templated,
        })
    }

    /// Read a navigable link: an object holding `href` and at most a
    /// `templated` flag. Objects with any other key are embedded data.
    pub fn from_reference(value: &Value) -> Option<Link> {
        let obj = value.as_object()?;
        if obj.keys().any(|key| key != "href" && key != "templated") {
            return None;
        }
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("href".to_string(), Value::String(self.href.clone()));
        if self.templated {
            obj.insert("templated".to_string(), Value::Bool(true));
        }
        Value::Object(obj)
    }
}
