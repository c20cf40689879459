//! Canonicalization pipeline
//!
//! Turns a set of root documents into a single canonical tree:
//! 1. gather the named collections, settle forward references, and resolve root content
//! 2. merge vendor paths and normalize host, path and parameter naming
//! 3. expand definitions and compositions, recording where every node came from
//! 4. strip the named collections and report unreferenced names
//! 5. sort every object's keys

use crate::expander::{SchemaExpander, SourceMapping};
use crate::host::normalize_document;
use crate::loader::{DocumentLoader, DocumentStore, RawDocument};
use crate::registry::{DefinitionRegistry, Resolver};
use rest_api_diff_common::json::{escape_pointer, pointer_child, sort_keys};
use rest_api_diff_common::{DiffError, RegistryKind, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Options controlling canonicalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizeOptions {
    /// Keep the four named collections (expanded) in the output
    pub preserve_named_collections: bool,
}

/// The canonical form of one side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDocument {
    /// Fully resolved, normalized, key-sorted tree
    pub tree: Value,
    /// Canonical pointer to source pointer
    pub mapping: SourceMapping,
    /// References that could not be resolved
    pub unresolved: Vec<String>,
    /// Declared names never referenced from outside the collections
    pub unreferenced: BTreeMap<RegistryKind, Vec<String>>,
}

impl CanonicalDocument {
    pub fn unreferenced_count(&self) -> usize {
        self.unreferenced.values().map(Vec::len).sum()
    }
}

/// Produces a [`CanonicalDocument`] from one or more root documents
pub struct Canonicalizer<'a> {
    loader: &'a dyn DocumentLoader,
    options: CanonicalizeOptions,
}

impl<'a> Canonicalizer<'a> {
    pub fn new(loader: &'a dyn DocumentLoader, options: CanonicalizeOptions) -> Self {
        Self { loader, options }
    }

    /// Run the full pipeline over `roots`
    pub fn canonicalize(&self, roots: &[RawDocument]) -> Result<CanonicalDocument> {
        let mut store = DocumentStore::new(self.loader);
        for root in roots {
            store.insert(root.clone());
        }

        // Phase 1: gather, revisit, and resolve root content
        let mut registry = DefinitionRegistry::new();
        registry.gather(&mut store)?;
        registry.revisit(&mut store)?;
        debug!(documents = store.len(), "named collections gathered");

        let mut resolved_roots = Vec::with_capacity(roots.len());
        for root in roots {
            let Some(tree) = root.tree.as_object() else {
                return Err(DiffError::Parse(format!(
                    "{} is not a JSON object",
                    root.origin.display()
                )));
            };
            let base_dir = root.base_dir();
            let mut resolved = Map::new();
            for (key, value) in tree {
                if RegistryKind::is_collection_key(key) {
                    continue;
                }
                let value = Resolver::new(&mut registry, &mut store, true).walk(value, &base_dir)?;
                resolved.insert(key.clone(), value);
            }
            resolved_roots.push(resolved);
        }

        // Phase 2: merge vendor paths and normalize naming
        let mut merged = Map::new();
        for resolved in resolved_roots {
            let normalized = normalize_document(resolved)?;
            merge_root(&mut merged, normalized)?;
        }
        mark_security_requirements(&merged, &mut registry);

        // Phase 3: expand definitions and compositions
        let definitions = registry.collection(RegistryKind::Definition);
        let mut expander = SchemaExpander::new(&definitions);
        let mut tree = Map::new();
        for (key, value) in &merged {
            let pointer = pointer_child("#", key);
            tree.insert(key.clone(), expander.expand(value, &pointer, &pointer));
        }

        let referenced_definitions: Vec<String> = expander.referenced().iter().cloned().collect();
        for name in &referenced_definitions {
            registry.mark_referenced(RegistryKind::Definition, name);
        }
        let unresolved = registry.unresolved_references();
        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), references = ?unresolved, "unresolved references");
        }
        let unreferenced = registry.unreferenced();
        for (kind, names) in &unreferenced {
            warn!(%kind, ?names, "unreferenced named entries");
        }

        // Phase 4: strip or keep the named collections
        if self.options.preserve_named_collections {
            for kind in RegistryKind::ALL {
                let collection = registry.collection(kind);
                if collection.is_empty() {
                    continue;
                }
                let pointer = pointer_child("#", kind.collection_key());
                let mut expanded = Map::new();
                for (name, value) in &collection {
                    let destination = format!("{pointer}/{}", escape_pointer(name));
                    let entry = match kind {
                        RegistryKind::Definition => expander
                            .expand_definition(name, &destination)
                            .unwrap_or_else(|| value.clone()),
                        _ => expander.expand(value, &destination, &destination),
                    };
                    expanded.insert(name.clone(), entry);
                }
                tree.insert(kind.collection_key().to_string(), Value::Object(expanded));
            }
        }
        let (mapping, _) = expander.into_parts();

        // Phase 5: sort keys
        Ok(CanonicalDocument {
            tree: sort_keys(Value::Object(tree)),
            mapping,
            unresolved,
            unreferenced,
        })
    }
}

/// Merge a normalized root into the accumulated result.
///
/// Paths are unioned and a path declared twice is fatal. Any other key keeps
/// its first declaration.
fn merge_root(merged: &mut Map<String, Value>, root: Map<String, Value>) -> Result<()> {
    for (key, value) in root {
        if key == "paths" {
            let Value::Object(incoming) = value else {
                continue;
            };
            let paths = merged
                .entry("paths")
                .or_insert_with(|| Value::Object(Map::new()));
            let Some(paths) = paths.as_object_mut() else {
                continue;
            };
            for (template, item) in incoming {
                if paths.contains_key(&template) {
                    return Err(DiffError::DuplicatePath { path: template });
                }
                paths.insert(template, item);
            }
        } else if !merged.contains_key(&key) {
            merged.insert(key, value);
        }
    }
    Ok(())
}

/// Security schemes count as referenced when a `security` requirement names them
fn mark_security_requirements(root: &Map<String, Value>, registry: &mut DefinitionRegistry) {
    let mut requirements: Vec<&Value> = root.get("security").into_iter().collect();
    if let Some(paths) = root.get("paths").and_then(Value::as_object) {
        for item in paths.values().filter_map(Value::as_object) {
            for operation in item.values() {
                if let Some(security) = operation.get("security") {
                    requirements.push(security);
                }
            }
        }
    }
    for requirement in requirements.into_iter().filter_map(Value::as_array).flatten() {
        if let Some(schemes) = requirement.as_object() {
            for name in schemes.keys() {
                registry.mark_referenced(RegistryKind::SecurityDefinition, name);
            }
        }
    }
}
