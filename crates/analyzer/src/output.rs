//! Result summary, violation grouping and output documents

use crate::analyzer::DiffReport;
use crate::engine::{ClassifiedDifference, Classification};
use crate::diff::Difference;
use crate::Result;
use indexmap::IndexMap;
use rest_api_diff_common::{RegistryKind, Segment};
use rest_api_diff_parser::CanonicalDocument;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;

/// Externally observable counts for one comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub flagged_count: usize,
    pub assumed_count: usize,
    pub no_violation_count: usize,
    /// Distinct rules behind the flagged violations
    pub rules_violated_count: usize,
    /// Distinct automatic groupings behind the assumed violations
    pub assumed_groups_count: usize,
    pub suppressed_count: usize,
    pub unresolved_reference_count: usize,
    pub unreferenced_definition_count: usize,
}

impl Summary {
    pub fn from_classification(
        classification: &Classification,
        unresolved_reference_count: usize,
        unreferenced_definition_count: usize,
    ) -> Self {
        let rules: BTreeSet<String> = classification.flagged().map(|r| r.group_name()).collect();
        let groups: BTreeSet<String> = classification.assumed().map(|r| r.group_name()).collect();
        Self {
            flagged_count: classification.flagged().count(),
            assumed_count: classification.assumed().count(),
            no_violation_count: classification.no_violations().count(),
            rules_violated_count: rules.len(),
            assumed_groups_count: groups.len(),
            suppressed_count: classification.suppressed().count(),
            unresolved_reference_count,
            unreferenced_definition_count,
        }
    }

    /// Whether the comparison found anything worth reporting.
    ///
    /// Unreferenced names only count when the named collections were stripped.
    pub fn has_issues(&self, preserve_definitions: bool) -> bool {
        self.flagged_count > 0
            || self.assumed_count > 0
            || self.unresolved_reference_count > 0
            || (!preserve_definitions && self.unreferenced_definition_count > 0)
    }
}

/// Differences sharing a rule or automatic group name
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationGroup<'a> {
    pub name: String,
    pub items: Vec<&'a ClassifiedDifference>,
}

impl ViolationGroup<'_> {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Group results by rule name, largest group first, ties by name
pub fn group_by_rule<'a>(
    results: impl IntoIterator<Item = &'a ClassifiedDifference>,
) -> Vec<ViolationGroup<'a>> {
    let mut grouped: IndexMap<String, Vec<&'a ClassifiedDifference>> = IndexMap::new();
    for result in results {
        grouped.entry(result.group_name()).or_default().push(result);
    }
    let mut groups: Vec<ViolationGroup<'a>> = grouped
        .into_iter()
        .map(|(name, items)| ViolationGroup { name, items })
        .collect();
    groups.sort_by(|a, b| b.count().cmp(&a.count()).then_with(|| a.name.cmp(&b.name)));
    groups
}

/// Shape of a diff output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffFileOptions {
    /// Emit `{name: {count, items}}` instead of a flat list
    pub group: bool,
    /// Render each path as a single `/`-joined, percent-encoded string
    pub flatten_paths: bool,
}

/// Build the JSON written to `diff.json` or `diff-inv.json`
pub fn diff_file<'a>(
    results: impl IntoIterator<Item = &'a ClassifiedDifference>,
    options: DiffFileOptions,
) -> Result<Value> {
    let results: Vec<&ClassifiedDifference> = results.into_iter().collect();
    if !options.group {
        let items = results
            .into_iter()
            .map(|result| item_json(result, options, false))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }

    let mut grouped = Map::new();
    for group in group_by_rule(results) {
        let items = group
            .items
            .iter()
            .map(|result| item_json(result, options, true))
            .collect::<Result<Vec<_>>>()?;
        let mut entry = Map::new();
        entry.insert("count".to_string(), Value::from(group.count()));
        entry.insert("items".to_string(), Value::Array(items));
        grouped.insert(group.name, Value::Object(entry));
    }
    Ok(Value::Object(grouped))
}

fn item_json(result: &ClassifiedDifference, options: DiffFileOptions, named: bool) -> Result<Value> {
    let mut value = serde_json::to_value(result)?;
    if named {
        value["ruleName"] = Value::String(result.group_name());
    }
    if options.flatten_paths {
        value["diff"]["path"] = Value::String(flatten_path(result.difference.path()));
    }
    Ok(value)
}

/// Join segments with `/`, percent-encoding each one
pub fn flatten_path(path: &[Segment]) -> String {
    path.iter()
        .map(|segment| encode_component(&segment.to_string()))
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_component(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*'
            | b'\'' | b'(' | b')' => encoded.push(char::from(byte)),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// Copies of both documents with the given differences removed.
///
/// Pruning the non-violations leaves only what needs review; pruning the
/// violations leaves what was judged irrelevant.
pub fn pruned_documents<'a>(
    lhs: &Value,
    rhs: &Value,
    results: impl IntoIterator<Item = &'a ClassifiedDifference>,
) -> (Value, Value) {
    let mut lhs_paths = Vec::new();
    let mut rhs_paths = Vec::new();
    for result in results {
        let difference = &result.difference;
        let target = match difference {
            Difference::Array { path, index, .. } => {
                let mut path = path.clone();
                path.push(Segment::Index(*index));
                path
            }
            _ => difference.path().to_vec(),
        };
        if difference.lhs().is_some() {
            lhs_paths.push(target.clone());
        }
        if difference.rhs().is_some() {
            rhs_paths.push(target);
        }
    }
    (prune(lhs, lhs_paths), prune(rhs, rhs_paths))
}

/// Remove every path from a copy of `doc`.
///
/// Paths are removed deepest-last-index first so array positions stay valid.
pub fn prune(doc: &Value, mut paths: Vec<Vec<Segment>>) -> Value {
    paths.sort_by(|a, b| compare_paths(b, a));
    paths.dedup();
    let mut pruned = doc.clone();
    for path in &paths {
        remove_path(&mut pruned, path);
    }
    pruned
}

fn compare_paths(a: &[Segment], b: &[Segment]) -> std::cmp::Ordering {
    for (left, right) in a.iter().zip(b) {
        let ordering = match (left, right) {
            (Segment::Index(l), Segment::Index(r)) => l.cmp(r),
            (Segment::Key(l), Segment::Key(r)) => l.cmp(r),
            (Segment::Key(_), Segment::Index(_)) => std::cmp::Ordering::Less,
            (Segment::Index(_), Segment::Key(_)) => std::cmp::Ordering::Greater,
        };
        if ordering.is_ne() {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

fn remove_path(root: &mut Value, path: &[Segment]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        let next = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
            (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return,
        }
    }
    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => {
            map.shift_remove(key);
        }
        (Segment::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
        }
        _ => {}
    }
}

/// Plain-text diagnostics: unresolved references and unreferenced names per side
pub fn generate_diagnostics(report: &DiffReport) -> Result<String> {
    let mut output = String::new();
    write_side(&mut output, "LEFT-HAND SIDE", &report.lhs, report.preserve_definitions)?;
    write_side(&mut output, "RIGHT-HAND SIDE", &report.rhs, report.preserve_definitions)?;
    Ok(output)
}

fn write_side(
    output: &mut String,
    title: &str,
    document: &CanonicalDocument,
    preserve_definitions: bool,
) -> Result<()> {
    let unreferenced: Vec<(&RegistryKind, &Vec<String>)> = if preserve_definitions {
        Vec::new()
    } else {
        document
            .unreferenced
            .iter()
            .filter(|(kind, names)| **kind != RegistryKind::SecurityDefinition && !names.is_empty())
            .collect()
    };
    if document.unresolved.is_empty() && unreferenced.is_empty() {
        return Ok(());
    }

    writeln!(output, "=== {title} ===")?;
    if !document.unresolved.is_empty() {
        writeln!(output, "== UNRESOLVED REFERENCES == ({})", document.unresolved.len())?;
        for reference in &document.unresolved {
            writeln!(output, "{reference}")?;
        }
        writeln!(output)?;
    }
    if !unreferenced.is_empty() {
        let total: usize = unreferenced.iter().map(|(_, names)| names.len()).sum();
        writeln!(output, "== UNREFERENCED DEFINITIONS == ({total})")?;
        for (kind, names) in unreferenced {
            writeln!(output, "**{kind}** ({})", names.len())?;
            for name in names {
                writeln!(output, "{name}")?;
            }
        }
        writeln!(output)?;
    }
    Ok(())
}
