//! Dotted-path access into JSON documents.

use serde_json::Value;

use super::Document;

/// Reads the value at a dotted path (`profile.firstName`).
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes the value at a dotted path, creating intermediate objects.
///
/// A non-object value in the way of the path is replaced by an object.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !child.is_object() {
                *child = Value::Object(Document::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// Removes the value at a dotted path, returning it if present.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Value::Object(map)) => remove_path(map, rest),
            _ => None,
        },
    }
}

/// Merges `patch` into `base` with document-store merge semantics.
///
/// Objects present on both sides merge recursively; any other value in
/// `patch` replaces the value in `base`.
pub fn merge_documents(base: &mut Document, patch: &Document) {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_documents(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
