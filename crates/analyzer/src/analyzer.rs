//! Comparison orchestration

use crate::engine::{Classification, DiffEngine};
use crate::output::Summary;
use crate::rules::RuleChain;
use crate::suppression::SuppressionList;
use crate::Result;
use rest_api_diff_common::DiffError;
use rest_api_diff_parser::{
    CanonicalDocument, CanonicalizeOptions, Canonicalizer, DocumentLoader, FsLoader, RawDocument,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Canonicalize one side of a comparison from its root files
pub fn canonicalize_files(
    paths: &[PathBuf],
    loader: &dyn DocumentLoader,
    options: CanonicalizeOptions,
) -> Result<CanonicalDocument> {
    let mut roots = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            return Err(DiffError::MissingInput(path.clone()).into());
        }
        roots.push(RawDocument::load(path, loader)?);
    }
    Ok(Canonicalizer::new(loader, options).canonicalize(&roots)?)
}

/// Compares two versions of an API description
pub struct ApiDiff {
    lhs: Vec<PathBuf>,
    rhs: Vec<PathBuf>,
    preserve_definitions: bool,
    disabled_rules: Vec<String>,
    suppressions: Option<PathBuf>,
    verbose: bool,
}

/// Everything produced by one comparison
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub lhs: CanonicalDocument,
    pub rhs: CanonicalDocument,
    pub classification: Classification,
    pub summary: Summary,
    pub preserve_definitions: bool,
}

impl DiffReport {
    pub fn has_issues(&self) -> bool {
        self.summary.has_issues(self.preserve_definitions)
    }
}

impl ApiDiff {
    /// Create a comparison between two sets of root files
    pub fn new(lhs: Vec<PathBuf>, rhs: Vec<PathBuf>) -> Self {
        Self {
            lhs,
            rhs,
            preserve_definitions: false,
            disabled_rules: Vec::new(),
            suppressions: None,
            verbose: false,
        }
    }

    /// Keep the named collections in the canonical documents
    pub fn preserve_definitions(mut self, preserve: bool) -> Self {
        self.preserve_definitions = preserve;
        self
    }

    /// Remove rules from the chain by name
    pub fn disable_rules(mut self, names: Vec<String>) -> Self {
        self.disabled_rules = names;
        self
    }

    /// Read suppressions from a YAML file
    pub fn suppressions(mut self, path: Option<PathBuf>) -> Self {
        self.suppressions = path;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the comparison against files on disk
    pub fn run(&self) -> Result<DiffReport> {
        self.run_with(&FsLoader)
    }

    /// Run the comparison with a custom loader
    pub fn run_with(&self, loader: &dyn DocumentLoader) -> Result<DiffReport> {
        let options = CanonicalizeOptions {
            preserve_named_collections: self.preserve_definitions,
        };

        // Phase 1: Read suppressions before any heavy work
        let mut suppressions = match &self.suppressions {
            Some(path) => {
                self.log(&format!("Reading suppressions from {}", path.display()));
                Some(SuppressionList::from_file(path)?)
            }
            None => None,
        };

        // Phase 2: Canonicalize both sides independently
        self.log(&format!("Canonicalizing {} left-hand file(s)...", self.lhs.len()));
        let lhs = canonicalize_files(&self.lhs, loader, options)?;
        self.log(&format!("Canonicalizing {} right-hand file(s)...", self.rhs.len()));
        let rhs = canonicalize_files(&self.rhs, loader, options)?;

        // Phase 3: Classify
        let chain = RuleChain::default_rules().without(&self.disabled_rules);
        self.log(&format!("Classifying with {} rules...", chain.len()));
        let engine = DiffEngine::new(chain);
        let mut classification = engine.classify(&lhs.tree, &rhs.tree);
        self.log(&format!(
            "Classified {} differences ({} dropped)",
            classification.len(),
            classification.dropped
        ));

        // Phase 4: Apply suppressions
        if let Some(list) = suppressions.as_mut() {
            list.propagate(&lhs.mapping);
            list.propagate(&rhs.mapping);
            let count = classification.apply_suppressions(list);
            self.log(&format!("Suppressed {count} violation(s)"));
        }

        let summary = Summary::from_classification(
            &classification,
            rhs.unresolved.len(),
            rhs.unreferenced_count(),
        );
        debug!(?summary, "comparison complete");

        Ok(DiffReport {
            lhs,
            rhs,
            classification,
            summary,
            preserve_definitions: self.preserve_definitions,
        })
    }

    fn log(&self, message: &str) {
        if self.verbose {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }
}

/// Whether `path` has an extension the loader understands
pub fn is_api_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Verdict;
    use serde_json::json;
    use tempfile::TempDir;

    mockall::mock! {
        Loader {}
        impl DocumentLoader for Loader {
            fn load(&self, path: &Path) -> rest_api_diff_common::Result<serde_json::Value>;
        }
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        let err = ApiDiff::new(vec![missing.clone()], vec![missing])
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_run_with_loader() {
        let dir = TempDir::new().unwrap();
        let lhs_path = dir.path().join("lhs.json");
        let rhs_path = dir.path().join("rhs.json");
        std::fs::write(&lhs_path, "{}").unwrap();
        std::fs::write(&rhs_path, "{}").unwrap();

        let mut loader = MockLoader::new();
        loader
            .expect_load()
            .withf(|path| path.ends_with("lhs.json"))
            .returning(|_| Ok(json!({"paths": {"/a": {"get": {"x-flag": 1}}}})));
        loader
            .expect_load()
            .withf(|path| path.ends_with("rhs.json"))
            .returning(|_| Ok(json!({"paths": {"/a": {"get": {"x-flag": 2}}}})));

        let report = ApiDiff::new(vec![lhs_path], vec![rhs_path])
            .run_with(&loader)
            .unwrap();
        assert_eq!(report.classification.len(), 1);
        assert_eq!(report.classification.results[0].verdict, Verdict::AssumedViolation);
        assert_eq!(report.summary.assumed_count, 1);
        assert!(report.has_issues());
    }

    #[test]
    fn test_is_api_document() {
        assert!(is_api_document(Path::new("a/b.json")));
        assert!(is_api_document(Path::new("a/b.yml")));
        assert!(!is_api_document(Path::new("a/b.md")));
    }
}
