//! `$ref` parsing

use regex::Regex;
use rest_api_diff_common::json::{escape_pointer, unescape_pointer};
use rest_api_diff_common::RegistryKind;
use std::sync::LazyLock;

/// `[file]#/<section>/<name>`
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^#]*)#/(?P<section>[^/]+)/(?P<name>.+)$").expect("valid regex")
});

/// Marker key left where a reference cycle was cut
pub const CIRCULAR_KEY: &str = "$circular";

/// The parsed identity of a `$ref` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMetadata {
    pub name: String,
    pub kind: RegistryKind,
    /// External file part, when the reference points outside the current document
    pub file: Option<String>,
}

impl ReferenceMetadata {
    /// Same-document form of this reference
    pub fn local_ref(&self) -> String {
        format!(
            "#/{}/{}",
            self.kind.collection_key(),
            escape_pointer(&self.name)
        )
    }
}

/// Parse a `$ref` value. Returns `None` for anything outside the grammar,
/// including pointers into sections other than the four named collections.
pub fn parse_reference(reference: &str) -> Option<ReferenceMetadata> {
    let captures = REFERENCE_RE.captures(reference.trim())?;
    let kind = RegistryKind::from_collection_key(&captures["section"])?;
    let file = captures
        .name("file")
        .map(|m| m.as_str())
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    Some(ReferenceMetadata {
        name: unescape_pointer(&captures["name"]),
        kind,
        file,
    })
}

/// The `$ref` string of a reference node, if `value` is one
pub fn reference_of(value: &serde_json::Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// Build a circular-reference marker node
pub fn circular_marker(reference: &str) -> serde_json::Value {
    serde_json::json!({ CIRCULAR_KEY: reference })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_local_reference() {
        let meta = parse_reference("#/definitions/Pet").unwrap();
        assert_eq!(meta.name, "Pet");
        assert_eq!(meta.kind, RegistryKind::Definition);
        assert_eq!(meta.file, None);
        assert_eq!(meta.local_ref(), "#/definitions/Pet");
    }

    #[test]
    fn test_parse_external_reference() {
        let meta = parse_reference("../common/types.json#/parameters/SubscriptionIdParameter")
            .unwrap();
        assert_eq!(meta.kind, RegistryKind::Parameter);
        assert_eq!(meta.name, "SubscriptionIdParameter");
        assert_eq!(meta.file.as_deref(), Some("../common/types.json"));

        let meta = parse_reference("security.yaml#/securityDefinitions/azure_auth").unwrap();
        assert_eq!(meta.kind, RegistryKind::SecurityDefinition);
    }

    #[test]
    fn test_parse_escaped_name() {
        let meta = parse_reference("#/definitions/a~1b~0c").unwrap();
        assert_eq!(meta.name, "a/b~c");
        assert_eq!(meta.local_ref(), "#/definitions/a~1b~0c");
    }

    #[test]
    fn test_unparseable_references() {
        assert!(parse_reference("#/paths/~1pets").is_none());
        assert!(parse_reference("#/definitions").is_none());
        assert!(parse_reference("common.json").is_none());
        assert!(parse_reference("").is_none());
    }

    #[test]
    fn test_reference_of() {
        assert_eq!(reference_of(&json!({"$ref": "#/definitions/A"})), Some("#/definitions/A"));
        assert_eq!(reference_of(&json!({"type": "string"})), None);
        assert_eq!(reference_of(&json!("#/definitions/A")), None);
    }
}
