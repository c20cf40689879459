//! Definition registry and reference resolution
//!
//! The registry holds the four named collections of every loaded document in
//! separate namespaces. It is filled in two passes: [`DefinitionRegistry::gather`]
//! captures each entry (walking it through the [`Resolver`]), and
//! [`DefinitionRegistry::revisit`] walks every stored value once more to settle
//! references that pointed at names captured later.
//!
//! Both passes record which entries each entry refers to, so an entry that is
//! only reached through another entry still counts as referenced.

use crate::loader::DocumentStore;
use crate::reference::{circular_marker, parse_reference};
use indexmap::{IndexMap, IndexSet};
use rest_api_diff_common::{DiffError, RegistryKind, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A captured named entry
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub value: Value,
    /// Document that declared the entry
    pub origin: PathBuf,
}

impl RegistryEntry {
    fn base_dir(&self) -> PathBuf {
        self.origin
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Named definitions, parameters, responses and security schemes
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    namespaces: BTreeMap<RegistryKind, IndexMap<String, RegistryEntry>>,
    unresolved: IndexSet<String>,
    referenced: HashSet<Identity>,
    /// Entry to the entries its stored value refers to
    edges: HashMap<Identity, IndexSet<Identity>>,
}

type Identity = (RegistryKind, String);

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the named collections of every pending document in `store`.
    ///
    /// Non-collection content is walked too, so that every file reachable
    /// through a `$ref` is loaded and captured in this pass.
    pub fn gather(&mut self, store: &mut DocumentStore<'_>) -> Result<()> {
        while let Some(origin) = store.next_pending() {
            let Some(document) = store.get(&origin).cloned() else {
                continue;
            };
            debug!(file = %origin.display(), "gathering named collections");
            let base_dir = document.base_dir();
            let Some(root) = document.tree.as_object() else {
                continue;
            };

            for kind in RegistryKind::ALL {
                let Some(collection) = root.get(kind.collection_key()).and_then(Value::as_object)
                else {
                    continue;
                };
                for (name, raw) in collection {
                    let value = Resolver::for_entry(self, store, kind, name).walk(raw, &base_dir)?;
                    self.insert(kind, name, value, &origin)?;
                }
            }

            for (key, value) in root {
                if !RegistryKind::is_collection_key(key) {
                    Resolver::new(self, store, false).walk(value, &base_dir)?;
                }
            }
        }
        Ok(())
    }

    /// Re-walk every stored value and recompute the unresolved set
    pub fn revisit(&mut self, store: &mut DocumentStore<'_>) -> Result<()> {
        self.unresolved.clear();
        for kind in RegistryKind::ALL {
            let names: Vec<String> = self.names(kind).map(str::to_string).collect();
            for name in names {
                let Some(entry) = self.entry(&name, kind).cloned() else {
                    continue;
                };
                let value = Resolver::for_entry(self, store, kind, &name)
                    .walk(&entry.value, &entry.base_dir())?;
                if let Some(stored) = self
                    .namespaces
                    .get_mut(&kind)
                    .and_then(|namespace| namespace.get_mut(&name))
                {
                    stored.value = value;
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, kind: RegistryKind, name: &str, value: Value, origin: &Path) -> Result<()> {
        let namespace = self.namespaces.entry(kind).or_default();
        if let Some(existing) = namespace.get(name) {
            return Err(DiffError::DuplicateName {
                kind,
                name: name.to_string(),
                first: existing.origin.display().to_string(),
                second: origin.display().to_string(),
            });
        }
        namespace.insert(
            name.to_string(),
            RegistryEntry {
                value,
                origin: origin.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Resolved value of a named entry
    pub fn get(&self, name: &str, kind: RegistryKind) -> Option<&Value> {
        self.entry(name, kind).map(|entry| &entry.value)
    }

    pub fn entry(&self, name: &str, kind: RegistryKind) -> Option<&RegistryEntry> {
        self.namespaces.get(&kind)?.get(name)
    }

    /// Names declared in one namespace, in capture order
    pub fn names(&self, kind: RegistryKind) -> impl Iterator<Item = &str> {
        self.namespaces
            .get(&kind)
            .into_iter()
            .flat_map(|namespace| namespace.keys().map(String::as_str))
    }

    /// One namespace as a JSON object
    pub fn collection(&self, kind: RegistryKind) -> Map<String, Value> {
        self.namespaces
            .get(&kind)
            .map(|namespace| {
                namespace
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn log_unresolved_reference(&mut self, reference: &str) {
        trace!(reference, "unresolved reference");
        self.unresolved.insert(reference.to_string());
    }

    /// References that could not be resolved, in first-seen order
    pub fn unresolved_references(&self) -> Vec<String> {
        self.unresolved.iter().cloned().collect()
    }

    pub fn mark_referenced(&mut self, kind: RegistryKind, name: &str) {
        self.referenced.insert((kind, name.to_string()));
    }

    fn record_edge(&mut self, from: Identity, to: Identity) {
        if from != to {
            self.edges.entry(from).or_default().insert(to);
        }
    }

    /// Whether the entry is referenced directly or through referenced entries
    pub fn is_referenced(&self, kind: RegistryKind, name: &str) -> bool {
        self.reachable().contains(&(kind, name.to_string()))
    }

    /// Marked names plus everything their stored values refer to, transitively
    fn reachable(&self) -> HashSet<Identity> {
        let mut reached = self.referenced.clone();
        let mut pending: Vec<&Identity> = self.referenced.iter().collect();
        while let Some(identity) = pending.pop() {
            for target in self.edges.get(identity).into_iter().flatten() {
                if reached.insert(target.clone()) {
                    pending.push(target);
                }
            }
        }
        reached
    }

    /// Declared names that nothing outside the collections referenced
    pub fn unreferenced(&self) -> BTreeMap<RegistryKind, Vec<String>> {
        let reached = self.reachable();
        let mut result = BTreeMap::new();
        for kind in RegistryKind::ALL {
            let names: Vec<String> = self
                .names(kind)
                .filter(|name| !reached.contains(&(kind, name.to_string())))
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                result.insert(kind, names);
            }
        }
        result
    }
}

/// Walks a tree, resolving `$ref` nodes against the registry.
///
/// Parameter, response and security references are inlined. Definition
/// references are rewritten to their local `#/definitions/<name>` form and
/// left for the schema expander, which needs the named identity.
pub struct Resolver<'r, 's, 'l> {
    registry: &'r mut DefinitionRegistry,
    store: &'s mut DocumentStore<'l>,
    track_references: bool,
    /// Registry entry whose value is being walked
    owner: Option<Identity>,
}

impl<'r, 's, 'l> Resolver<'r, 's, 'l> {
    pub fn new(
        registry: &'r mut DefinitionRegistry,
        store: &'s mut DocumentStore<'l>,
        track_references: bool,
    ) -> Self {
        Self {
            registry,
            store,
            track_references,
            owner: None,
        }
    }

    /// A resolver for the stored value of one registry entry.
    ///
    /// References it meets are recorded as edges of that entry, and the
    /// entry's own identity guards against it inlining itself.
    pub fn for_entry(
        registry: &'r mut DefinitionRegistry,
        store: &'s mut DocumentStore<'l>,
        kind: RegistryKind,
        name: &str,
    ) -> Self {
        Self {
            owner: Some((kind, name.to_string())),
            ..Self::new(registry, store, false)
        }
    }

    pub fn walk(&mut self, node: &Value, base_dir: &Path) -> Result<Value> {
        let mut visited: Vec<Identity> = self
            .owner
            .iter()
            .filter(|owner| owner.0 != RegistryKind::Definition)
            .cloned()
            .collect();
        self.walk_node(node, base_dir, &mut visited)
    }

    fn walk_node(
        &mut self,
        node: &Value,
        base_dir: &Path,
        visited: &mut Vec<Identity>,
    ) -> Result<Value> {
        match node {
            Value::Array(items) => items
                .iter()
                .map(|item| self.walk_node(item, base_dir, visited))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return self.resolve(node, reference, base_dir, visited);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.walk_node(value, base_dir, visited)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve(
        &mut self,
        node: &Value,
        reference: &str,
        base_dir: &Path,
        visited: &mut Vec<Identity>,
    ) -> Result<Value> {
        let Some(meta) = parse_reference(reference) else {
            self.registry.log_unresolved_reference(reference);
            return Ok(node.clone());
        };

        if let Some(file) = &meta.file {
            self.store.ensure_loaded(&base_dir.join(file))?;
        }
        if self.track_references {
            self.registry.mark_referenced(meta.kind, &meta.name);
        }
        if let Some(owner) = &self.owner {
            self.registry
                .record_edge(owner.clone(), (meta.kind, meta.name.clone()));
        }

        if meta.kind == RegistryKind::Definition {
            if self.registry.get(&meta.name, meta.kind).is_none() {
                self.registry.log_unresolved_reference(&meta.name);
            }
            return Ok(json!({ "$ref": meta.local_ref() }));
        }

        let identity = (meta.kind, meta.name.clone());
        if visited.contains(&identity) {
            return Ok(circular_marker(reference));
        }
        let Some(entry) = self.registry.entry(&meta.name, meta.kind).cloned() else {
            // left in place for the revisit pass
            self.registry.log_unresolved_reference(&meta.name);
            return Ok(json!({ "$ref": meta.local_ref() }));
        };

        visited.push(identity);
        let resolved = self.walk_node(&entry.value, &entry.base_dir(), visited);
        visited.pop();
        resolved
    }
}
