//! Common types and utilities for rest-api-diff
//!
//! This crate contains the shared error type, the registry namespaces, the
//! path tracker used by the classifier, and a handful of JSON helpers used by
//! the parser, analyzer, and CLI components.

pub mod json;
pub mod path;

pub use path::{PathKind, Segment, SwaggerPath};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading and canonicalizing API descriptions
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Duplicate {kind} '{name}' declared in both {first} and {second}")]
    DuplicateName {
        kind: RegistryKind,
        name: String,
        first: String,
        second: String,
    },

    #[error("Duplicate path '{path}' declared in more than one document")]
    DuplicatePath { path: String },

    #[error("Input path does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("Failed to load '{path}': {message}")]
    Load { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for canonicalization operations
pub type Result<T> = std::result::Result<T, DiffError>;

/// One of the four named collections of a Swagger document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegistryKind {
    Definition,
    Parameter,
    Response,
    SecurityDefinition,
}

impl RegistryKind {
    /// All kinds, in document order
    pub const ALL: [RegistryKind; 4] = [
        RegistryKind::Definition,
        RegistryKind::Parameter,
        RegistryKind::Response,
        RegistryKind::SecurityDefinition,
    ];

    /// The root key holding this collection in a Swagger document
    pub fn collection_key(self) -> &'static str {
        match self {
            RegistryKind::Definition => "definitions",
            RegistryKind::Parameter => "parameters",
            RegistryKind::Response => "responses",
            RegistryKind::SecurityDefinition => "securityDefinitions",
        }
    }

    /// Map a root key back to its collection kind
    pub fn from_collection_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection_key() == key)
    }

    /// Whether `key` names one of the four named collections
    pub fn is_collection_key(key: &str) -> bool {
        Self::from_collection_key(key).is_some()
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::Definition => write!(f, "definition"),
            RegistryKind::Parameter => write!(f, "parameter"),
            RegistryKind::Response => write!(f, "response"),
            RegistryKind::SecurityDefinition => write!(f, "security definition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_key_round_trip() {
        for kind in RegistryKind::ALL {
            assert_eq!(
                RegistryKind::from_collection_key(kind.collection_key()),
                Some(kind)
            );
        }
        assert_eq!(RegistryKind::from_collection_key("paths"), None);
    }

    #[test]
    fn test_duplicate_name_message() {
        let err = DiffError::DuplicateName {
            kind: RegistryKind::Definition,
            name: "Widget".to_string(),
            first: "a.json".to_string(),
            second: "b.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate definition 'Widget' declared in both a.json and b.json"
        );
    }
}
