//! Suppression list
//!
//! A suppression file is a YAML list of `{path, reason}` entries. Paths are
//! dotted, case-insensitive, and match their own location and everything
//! beneath it. An entry written against a named definition is propagated onto
//! every canonical location the definition was expanded into.

use crate::Result;
use rest_api_diff_common::json::pointer_to_dotted;
use rest_api_diff_parser::SourceMapping;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawEntry {
    path: String,
    #[serde(default)]
    reason: String,
}

/// One suppressed location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionEntry {
    /// Lower-cased, trimmed dotted path
    pub path: String,
    pub reason: String,
    /// Canonical paths this entry was propagated onto
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub propagated: Vec<String>,
}

impl SuppressionEntry {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: normalize(path),
            reason: reason.into(),
            propagated: Vec::new(),
        }
    }

    /// Whether `path` (already normalized) is covered by this entry
    pub fn covers(&self, path: &str) -> bool {
        is_within(path, &self.path) || self.propagated.iter().any(|target| is_within(path, target))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuppressionList {
    entries: Vec<SuppressionEntry>,
}

impl SuppressionList {
    pub fn new(entries: Vec<SuppressionEntry>) -> Self {
        Self { entries }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let raw: Option<Vec<RawEntry>> = serde_yaml::from_str(source)?;
        let entries = raw
            .unwrap_or_default()
            .into_iter()
            .map(|entry| SuppressionEntry::new(&entry.path, entry.reason))
            .collect();
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Copy entries onto the canonical locations whose recorded source is the entry's path
    pub fn propagate(&mut self, mapping: &SourceMapping) {
        for (destination, source) in mapping.iter() {
            let source = normalize(&pointer_to_dotted(source));
            let Some(entry) = self.entries.iter_mut().find(|entry| entry.path == source) else {
                continue;
            };
            let target = normalize(&pointer_to_dotted(destination));
            if target != entry.path && !entry.propagated.contains(&target) {
                debug!(entry = %entry.path, %target, "suppression propagated");
                entry.propagated.push(target);
            }
        }
    }

    /// The first entry covering `path`
    pub fn find(&self, path: &str) -> Option<&SuppressionEntry> {
        let path = normalize(path);
        self.entries.iter().find(|entry| entry.covers(&path))
    }

    pub fn entries(&self) -> &[SuppressionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.trim().to_lowercase()
}

/// `path` equals `prefix` or lies beneath it on a segment boundary
fn is_within(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_normalize() {
        let list = SuppressionList::from_yaml_str(
            r#"
- path: "  Paths./Pets.GET.responses.200 "
  reason: known break
- path: definitions.Pet.properties.name
"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].path, "paths./pets.get.responses.200");
        assert_eq!(list.entries()[0].reason, "known break");
        assert_eq!(list.entries()[1].reason, "");
    }

    #[test]
    fn test_empty_file() {
        assert!(SuppressionList::from_yaml_str("").unwrap().is_empty());
    }

    #[test]
    fn test_prefix_matching_on_segment_boundary() {
        let list = SuppressionList::new(vec![SuppressionEntry::new("paths./a.get", "r")]);
        assert!(list.find("paths./a.get").is_some());
        assert!(list.find("PATHS./a.get.responses.200").is_some());
        assert!(list.find("paths./a.getx").is_none());
        assert!(list.find("paths./a").is_none());
    }

    #[test]
    fn test_propagation_through_mapping() {
        let mut mapping = SourceMapping::default();
        mapping.record(
            "#/paths/~1pets/get/responses/200/schema/properties/name",
            "#/definitions/Pet/properties/name",
        );
        mapping.record("#/paths/~1pets/get/responses/200/schema", "#/definitions/Pet");

        let mut list = SuppressionList::new(vec![SuppressionEntry::new(
            "definitions.Pet.properties.name",
            "renamed",
        )]);
        list.propagate(&mapping);

        let entry = &list.entries()[0];
        assert_eq!(
            entry.propagated,
            vec!["paths./pets.get.responses.200.schema.properties.name".to_string()]
        );
        assert!(list
            .find("paths./pets.get.responses.200.schema.properties.name.type")
            .is_some());
        assert!(list
            .find("paths./pets.get.responses.200.schema.properties.id")
            .is_none());
    }
}
