//! JSON helpers shared by the canonicalizer and the classifier

use crate::Segment;
use serde_json::{Map, Value};

/// Escape a key for use inside a JSON pointer
pub fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_pointer`]
pub fn unescape_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Append one key to a `#/...` pointer
pub fn pointer_child(pointer: &str, key: &str) -> String {
    format!("{pointer}/{}", escape_pointer(key))
}

/// Render a `#/a/b~1c` pointer as the dotted path `a.b/c`
pub fn pointer_to_dotted(pointer: &str) -> String {
    pointer
        .trim_start_matches('#')
        .split('/')
        .filter(|token| !token.is_empty())
        .map(unescape_pointer)
        .collect::<Vec<_>>()
        .join(".")
}

/// Follow `segments` from `root`
pub fn lookup<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |node, segment| match segment {
        Segment::Key(key) => node.as_object()?.get(key),
        Segment::Index(index) => node.as_array()?.get(*index),
    })
}

/// Recursively rebuild every object with its keys in byte order
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
