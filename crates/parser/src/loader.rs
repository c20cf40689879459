//! Loading Swagger source files into generic JSON trees

use rest_api_diff_common::{DiffError, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Reads one source file into a JSON tree
#[cfg_attr(test, mockall::automock)]
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Value>;
}

/// Loads JSON or YAML files from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl DocumentLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path).map_err(|e| DiffError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        parse_source(path, &content)
    }
}

/// Parse file content as JSON, falling back to YAML.
///
/// Files with a `.yaml`/`.yml` extension go straight to the YAML parser.
pub fn parse_source(path: &Path, content: &str) -> Result<Value> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if !is_yaml {
        if let Ok(value) = serde_json::from_str::<Value>(content) {
            return Ok(value);
        }
    }
    serde_yaml::from_str::<Value>(content).map_err(|e| DiffError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// A parsed source document and the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// File identity, used to resolve relative `$ref` file parts
    pub origin: PathBuf,
    /// Parsed content
    pub tree: Value,
}

impl RawDocument {
    pub fn new(origin: impl Into<PathBuf>, tree: Value) -> Self {
        Self {
            origin: normalize_path(&origin.into()),
            tree,
        }
    }

    /// Load a document through `loader`
    pub fn load(path: &Path, loader: &dyn DocumentLoader) -> Result<Self> {
        let tree = loader.load(path)?;
        Ok(Self::new(path, tree))
    }

    /// Directory that relative references are resolved against
    pub fn base_dir(&self) -> PathBuf {
        self.origin
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Lexically normalize a path, folding `.` and `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Every document loaded during one canonicalization run, keyed by origin.
///
/// Documents are queued when first inserted so the registry can visit each
/// one exactly once, including files only discovered through `$ref`s.
pub struct DocumentStore<'a> {
    loader: &'a dyn DocumentLoader,
    documents: HashMap<PathBuf, RawDocument>,
    pending: VecDeque<PathBuf>,
}

impl<'a> DocumentStore<'a> {
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self {
            loader,
            documents: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Add an already-parsed document
    pub fn insert(&mut self, document: RawDocument) {
        let origin = document.origin.clone();
        if !self.documents.contains_key(&origin) {
            self.pending.push_back(origin.clone());
            self.documents.insert(origin, document);
        }
    }

    /// Load `path` unless it is already known. Unreadable files are fatal.
    pub fn ensure_loaded(&mut self, path: &Path) -> Result<()> {
        let key = normalize_path(path);
        if self.documents.contains_key(&key) {
            return Ok(());
        }
        debug!(file = %key.display(), "loading referenced document");
        let document = RawDocument::load(&key, self.loader)?;
        self.insert(document);
        Ok(())
    }

    /// Next document not yet visited by the registry
    pub fn next_pending(&mut self) -> Option<PathBuf> {
        self.pending.pop_front()
    }

    pub fn get(&self, origin: &Path) -> Option<&RawDocument> {
        self.documents.get(origin)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
