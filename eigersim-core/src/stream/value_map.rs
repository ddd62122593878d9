//! Helpers for working with text-keyed CBOR maps.
//!
//! `ciborium::Value` maps are ordered key/value vectors; these helpers
//! give the engines replace-or-insert semantics without disturbing the
//! template field order consumers expect.

use ciborium::value::Value;

use super::StreamError;

/// Mutably borrows the entry list of a map value.
pub(crate) fn as_map_mut<'a>(
    value: &'a mut Value,
    what: &str,
) -> Result<&'a mut Vec<(Value, Value)>, StreamError> {
    value.as_map_mut().ok_or_else(|| StreamError::Template {
        reason: format!("{what} is not a map"),
    })
}

/// Looks up a text key.
pub(crate) fn get<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Mutably looks up a text key.
pub(crate) fn get_mut<'a>(
    entries: &'a mut [(Value, Value)],
    key: &str,
) -> Option<&'a mut Value> {
    entries
        .iter_mut()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Replaces the value under a text key, appending the entry if absent.
pub(crate) fn insert(entries: &mut Vec<(Value, Value)>, key: &str, value: Value) {
    match get_mut(entries, key) {
        Some(existing) => *existing = value,
        None => entries.push((Value::Text(key.to_string()), value)),
    }
}

/// Removes the entry under a text key, if present.
pub(crate) fn remove(entries: &mut Vec<(Value, Value)>, key: &str) {
    entries.retain(|(k, _)| k.as_text() != Some(key));
}
