//! Schema expansion: definition references, polymorphic unions and `allOf` merging

use crate::inheritance::InheritanceMap;
use crate::reference::{circular_marker, parse_reference, CIRCULAR_KEY};
use indexmap::IndexMap;
use rest_api_diff_common::json::{escape_pointer, pointer_child};
use rest_api_diff_common::RegistryKind;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Key of the union node that replaces a reference to a polymorphic base
pub const ANY_OF_KEY: &str = "$anyOf";

/// Records, for each node written to the canonical tree, where it came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMapping {
    entries: IndexMap<String, String>,
}

impl SourceMapping {
    /// Record a destination's source. The first recording wins, so inherited
    /// members keep pointing at the definition that declared them.
    pub fn record(&mut self, destination: &str, source: &str) {
        self.entries
            .entry(destination.to_string())
            .or_insert_with(|| source.to_string());
    }

    pub fn source_of(&self, destination: &str) -> Option<&str> {
        self.entries.get(destination).map(String::as_str)
    }

    /// `(destination, source)` pairs in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(d, s)| (d.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(d, s)| (d.clone(), Value::String(s.clone())))
                .collect(),
        )
    }
}

/// Expands every definition reference reachable from a node
pub struct SchemaExpander<'a> {
    definitions: &'a Map<String, Value>,
    inheritance: InheritanceMap,
    mapping: SourceMapping,
    referenced: HashSet<String>,
}

impl<'a> SchemaExpander<'a> {
    pub fn new(definitions: &'a Map<String, Value>) -> Self {
        Self {
            definitions,
            inheritance: InheritanceMap::build(definitions),
            mapping: SourceMapping::default(),
            referenced: HashSet::new(),
        }
    }

    pub fn inheritance(&self) -> &InheritanceMap {
        &self.inheritance
    }

    /// Expand `node`, recording its position as `destination` and its origin as `source`
    pub fn expand(&mut self, node: &Value, destination: &str, source: &str) -> Value {
        self.expand_node(node, destination, source, &HashSet::new())
    }

    /// Expand a named definition in place, without the polymorphic union
    pub fn expand_definition(&mut self, name: &str, destination: &str) -> Option<Value> {
        let reference = format!("#/definitions/{}", escape_pointer(name));
        self.definitions.get(name)?;
        Some(self.expand_named(name, &reference, destination, &HashSet::new()))
    }

    /// Definition names reached during expansion
    pub fn referenced(&self) -> &HashSet<String> {
        &self.referenced
    }

    pub fn into_parts(self) -> (SourceMapping, HashSet<String>) {
        (self.mapping, self.referenced)
    }

    fn expand_node(
        &mut self,
        node: &Value,
        destination: &str,
        source: &str,
        seen: &HashSet<String>,
    ) -> Value {
        if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
            return self.expand_reference(node, reference, destination, source, seen, true);
        }
        self.mapping.record(destination, source);
        match node {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let index = i.to_string();
                        self.expand_node(
                            item,
                            &pointer_child(destination, &index),
                            &pointer_child(source, &index),
                            seen,
                        )
                    })
                    .collect(),
            ),
            Value::Object(map) => {
                if map.contains_key(CIRCULAR_KEY) {
                    return node.clone();
                }
                if let Some(all_of) = map.get("allOf").and_then(Value::as_array) {
                    return self.expand_all_of(map, all_of, destination, source, seen);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    let expanded = self.expand_node(
                        value,
                        &pointer_child(destination, key),
                        &pointer_child(source, key),
                        seen,
                    );
                    out.insert(key.clone(), expanded);
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn expand_reference(
        &mut self,
        node: &Value,
        reference: &str,
        destination: &str,
        source: &str,
        seen: &HashSet<String>,
        polymorphic: bool,
    ) -> Value {
        let known = parse_reference(reference).filter(|meta| {
            meta.kind == RegistryKind::Definition && self.definitions.contains_key(&meta.name)
        });
        let Some(meta) = known else {
            self.mapping.record(destination, source);
            return node.clone();
        };

        if polymorphic && self.inheritance.has_children(&meta.name) {
            let leaves = self.inheritance.leaf_descendants(&meta.name);
            if !leaves.is_empty() {
                self.mapping.record(destination, reference);
                self.referenced.insert(meta.name.clone());
                let members = leaves
                    .iter()
                    .enumerate()
                    .map(|(i, leaf)| {
                        let leaf_reference = format!("#/definitions/{}", escape_pointer(leaf));
                        let member_destination =
                            pointer_child(&pointer_child(destination, ANY_OF_KEY), &i.to_string());
                        self.expand_named(leaf, &leaf_reference, &member_destination, seen)
                    })
                    .collect();
                let mut union = Map::new();
                union.insert(ANY_OF_KEY.to_string(), Value::Array(members));
                return Value::Object(union);
            }
        }

        self.expand_named(&meta.name, reference, destination, seen)
    }

    fn expand_named(
        &mut self,
        name: &str,
        reference: &str,
        destination: &str,
        seen: &HashSet<String>,
    ) -> Value {
        if seen.contains(name) {
            self.mapping.record(destination, reference);
            return circular_marker(reference);
        }
        let Some(schema) = self.definitions.get(name) else {
            return serde_json::json!({ "$ref": reference });
        };
        self.referenced.insert(name.to_string());
        let mut next = seen.clone();
        next.insert(name.to_string());
        let source = format!("#/definitions/{}", escape_pointer(name));
        self.expand_node(schema, destination, &source, &next)
    }

    /// Members are expanded in place at `destination` and merged left to
    /// right, followed by the node's own keys.
    fn expand_all_of(
        &mut self,
        map: &Map<String, Value>,
        all_of: &[Value],
        destination: &str,
        source: &str,
        seen: &HashSet<String>,
    ) -> Value {
        let mut merged = Value::Object(Map::new());
        for (i, member) in all_of.iter().enumerate() {
            let member_source = pointer_child(&pointer_child(source, "allOf"), &i.to_string());
            // composition includes the parent's own shape, never the union of its subtypes
            let expanded = match member.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    self.expand_reference(member, reference, destination, &member_source, seen, false)
                }
                None => self.expand_node(member, destination, &member_source, seen),
            };
            merged = merge(merged, expanded);
        }

        let own: Map<String, Value> = map
            .iter()
            .filter(|(key, _)| key.as_str() != "allOf")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let own = self.expand_node(&Value::Object(own), destination, source, seen);
        merged = merge(merged, own);
        self.expand_node(&merged, destination, source, seen)
    }
}

/// Deep merge used for `allOf` composition.
///
/// Objects merge key-wise, arrays concatenate, and otherwise `right` wins.
pub fn merge(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, value) in right {
                let combined = match left.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                left.insert(key, combined);
            }
            Value::Object(left)
        }
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Value::Array(left)
        }
        (_, right) => right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_semantics() {
        let merged = merge(
            json!({"type": "object", "required": ["a"], "properties": {"a": {"type": "string"}}}),
            json!({"type": "string", "required": ["b"], "properties": {"b": {"type": "integer"}}}),
        );
        assert_eq!(
            merged,
            json!({
                "type": "string",
                "required": ["a", "b"],
                "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}
            })
        );
    }

    #[test]
    fn test_base_reference_becomes_union_of_leaves() {
        let definitions = defs(json!({
            "A": {"properties": {"kind": {"type": "string"}}},
            "B": {"allOf": [{"$ref": "#/definitions/A"}], "properties": {"b": {"type": "string"}}},
            "C": {"allOf": [{"$ref": "#/definitions/B"}], "properties": {"c": {"type": "string"}}}
        }));
        let mut expander = SchemaExpander::new(&definitions);
        let expanded = expander.expand(&json!({"$ref": "#/definitions/A"}), "#/x", "#/x");

        let members = expanded[ANY_OF_KEY].as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(
            members[0],
            json!({"properties": {
                "kind": {"type": "string"},
                "b": {"type": "string"},
                "c": {"type": "string"}
            }})
        );
        assert!(expander.referenced().contains("A"));
        assert!(expander.referenced().contains("C"));
    }

    #[test]
    fn test_self_reference_yields_one_marker() {
        let definitions = defs(json!({
            "Node": {"properties": {"next": {"$ref": "#/definitions/Node"}}}
        }));
        let mut expander = SchemaExpander::new(&definitions);
        let expanded = expander.expand(&json!({"$ref": "#/definitions/Node"}), "#", "#");
        assert_eq!(
            expanded,
            json!({"properties": {"next": {"$circular": "#/definitions/Node"}}})
        );
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let definitions = defs(json!({
            "X": {"properties": {"y": {"$ref": "#/definitions/Y"}}},
            "Y": {"properties": {"x": {"$ref": "#/definitions/X"}}}
        }));
        let mut expander = SchemaExpander::new(&definitions);
        let expanded = expander.expand(&json!({"$ref": "#/definitions/X"}), "#", "#");
        assert_eq!(
            expanded,
            json!({"properties": {"y": {"properties": {"x": {"$circular": "#/definitions/X"}}}}})
        );
    }

    #[test]
    fn test_mapping_points_back_to_definitions() {
        let definitions = defs(json!({
            "Pet": {"properties": {"name": {"type": "string"}}}
        }));
        let mut expander = SchemaExpander::new(&definitions);
        expander.expand(
            &json!({"schema": {"$ref": "#/definitions/Pet"}}),
            "#/paths/~1pets/get",
            "#/paths/~1pets/get",
        );
        let (mapping, _) = expander.into_parts();
        assert_eq!(
            mapping.source_of("#/paths/~1pets/get/schema/properties/name"),
            Some("#/definitions/Pet/properties/name")
        );
        assert_eq!(
            mapping.source_of("#/paths/~1pets/get/schema"),
            Some("#/definitions/Pet")
        );
    }

    #[test]
    fn test_unknown_reference_is_left_alone() {
        let definitions = Map::new();
        let mut expander = SchemaExpander::new(&definitions);
        let node = json!({"$ref": "#/definitions/Missing"});
        assert_eq!(expander.expand(&node, "#", "#"), node);
    }

    #[test]
    fn test_own_keys_merge_after_all_of() {
        let definitions = defs(json!({
            "Base": {"type": "object", "properties": {"id": {"type": "string", "readOnly": true}}}
        }));
        let mut expander = SchemaExpander::new(&definitions);
        let expanded = expander.expand(
            &json!({
                "allOf": [{"$ref": "#/definitions/Base"}],
                "properties": {"id": {"readOnly": false}}
            }),
            "#",
            "#",
        );
        assert_eq!(
            expanded,
            json!({"type": "object", "properties": {"id": {"type": "string", "readOnly": false}}})
        );
    }
}
