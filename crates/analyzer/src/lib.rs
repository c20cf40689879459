//! Compatibility analysis for Swagger 2.0 API descriptions
//!
//! Diffs two canonical documents and classifies every structural difference
//! as a flagged violation, an assumed violation, or no violation.
//!
//! # Examples
//!
//! ```no_run
//! use rest_api_diff_analyzer::ApiDiff;
//! use std::path::PathBuf;
//!
//! let report = ApiDiff::new(
//!     vec![PathBuf::from("specs/2023-01-01/storage.json")],
//!     vec![PathBuf::from("specs/2024-01-01/storage.json")],
//! )
//! .run()
//! .expect("Comparison failed");
//!
//! println!("Flagged violations: {}", report.summary.flagged_count);
//! for violation in report.classification.flagged() {
//!     println!("{}: {:?}", violation.difference.dotted(), violation.rule);
//! }
//! ```

mod analyzer;
pub mod diff;
mod engine;
pub mod output;
pub mod rules;
mod suppression;

pub use analyzer::{canonicalize_files, is_api_document, ApiDiff, DiffReport};
pub use diff::{ArrayItem, Change, Difference};
pub use engine::{auto_group_name, gate, Classification, ClassifiedDifference, DiffEngine, Gate, Verdict};
pub use output::{DiffFileOptions, Summary, ViolationGroup};
pub use rules::{FnRule, Rule, RuleChain, RuleOutcome};
pub use suppression::{SuppressionEntry, SuppressionList};

use rest_api_diff_common::DiffError;
use thiserror::Error;

/// Errors that can occur during comparison
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Canonical(#[from] DiffError),

    #[error("Failed to read suppression file: {0}")]
    SuppressionRead(#[from] std::io::Error),

    #[error("Failed to parse suppression file: {0}")]
    SuppressionParse(#[from] serde_yaml::Error),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to format output: {0}")]
    FormatError(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
