//! Inheritance relationships derived from `allOf` composition

use crate::reference::{parse_reference, reference_of};
use indexmap::IndexMap;
use rest_api_diff_common::RegistryKind;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Maps a base definition to the definitions that compose it through `allOf`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritanceMap {
    children: IndexMap<String, Vec<String>>,
}

impl InheritanceMap {
    /// Scan every definition's `allOf` members for references to a parent
    pub fn build(definitions: &Map<String, Value>) -> Self {
        let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
        for (name, schema) in definitions {
            let Some(all_of) = schema.get("allOf").and_then(Value::as_array) else {
                continue;
            };
            for member in all_of {
                let Some(meta) = reference_of(member).and_then(parse_reference) else {
                    continue;
                };
                if meta.kind != RegistryKind::Definition {
                    continue;
                }
                let entry = children.entry(meta.name).or_default();
                if !entry.contains(name) {
                    entry.push(name.clone());
                }
            }
        }
        Self { children }
    }

    /// Whether `name` has at least one recorded child
    pub fn has_children(&self, name: &str) -> bool {
        self.children.get(name).is_some_and(|kids| !kids.is_empty())
    }

    pub fn children(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Leaf subtypes of `name`.
    ///
    /// A name without children is its own sole leaf. Intermediate types never
    /// appear. Diamonds are deduplicated and inheritance cycles are cut.
    pub fn leaf_descendants(&self, name: &str) -> Vec<String> {
        let mut leaves = Vec::new();
        let mut visiting = HashSet::new();
        self.collect_leaves(name, &mut visiting, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, name: &str, visiting: &mut HashSet<String>, leaves: &mut Vec<String>) {
        if !visiting.insert(name.to_string()) {
            return;
        }
        if !self.has_children(name) {
            if !leaves.iter().any(|leaf| leaf == name) {
                leaves.push(name.to_string());
            }
        } else {
            for child in self.children(name) {
                self.collect_leaves(child, visiting, leaves);
            }
        }
        visiting.remove(name);
    }
}
