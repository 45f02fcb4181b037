//! Reference scanner.
//!
//! References are structural: an entity refers to another when one of its
//! fields holds exactly `{"href": <uri>}`, or an array containing such an
//! object. There is no back-index; every scan walks the whole table, which
//! costs O(entities x fields) per call. Cascade ordering depends on seeing
//! the table as it is at scan time, so this is not cached.

use serde_json::Value;

use crate::types::Snapshot;

/// `value` is exactly a link object pointing at `uri`.
///
/// Objects that carry other keys next to `href` are embedded data, not a
/// navigable reference, and do not match.
pub fn is_reference_to(value: &Value, uri: &str) -> bool {
    match value.as_object() {
        Some(obj) => obj.len() == 1 && obj.get("href").and_then(Value::as_str) == Some(uri),
        None => false,
    }
}

/// `value` is an array with at least one exact reference to `uri`.
pub fn is_array_with_reference_to(value: &Value, uri: &str) -> bool {
    value
        .as_array()
        .is_some_and(|entries| entries.iter().any(|entry| is_reference_to(entry, uri)))
}

/// Whether `snapshot` holds a direct or array reference to `uri`.
pub fn references(snapshot: &Snapshot, uri: &str) -> bool {
    let in_fields = snapshot
        .fields()
        .values()
        .any(|value| is_reference_to(value, uri) || is_array_with_reference_to(value, uri));

    // collection items are stored as plain links, never with extra keys
    let in_items = snapshot
        .items()
        .is_some_and(|items| items.iter().any(|link| !link.templated && link.href == uri));

    in_fields || in_items
}

/// Every snapshot that references `uri`.
pub fn find_referencing<'a, I>(entries: I, uri: &str) -> Vec<Snapshot>
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    entries
        .into_iter()
        .filter(|snapshot| references(snapshot, uri))
        .cloned()
        .collect()
}
