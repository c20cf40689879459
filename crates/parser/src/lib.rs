//! Swagger 2.0 canonicalization
//!
//! This crate turns one or more Swagger documents (JSON or YAML, possibly
//! split across files) into a single canonical tree that can be compared
//! structurally against another version of the same API.
//!
//! ## Canonicalization Strategy
//!
//! - Named collections (`definitions`, `parameters`, `responses`,
//!   `securityDefinitions`) are gathered from every loaded file into separate
//!   namespaces; forward references are settled by a second pass
//! - Parameters, responses and security schemes are inlined where referenced
//! - Definitions are expanded in place; a reference to a base type with
//!   subtypes becomes a `$anyOf` union of its leaf subtypes
//! - `x-ms-paths` are merged into `paths`, host templates are pushed into each
//!   operation, and path parameter names are normalized
//! - Reference cycles are cut with a `{"$circular": "<ref>"}` marker
//! - Keys are sorted so equivalent documents serialize identically
//!
//! # Examples
//!
//! ```no_run
//! use rest_api_diff_parser::{CanonicalizeOptions, Canonicalizer, FsLoader, RawDocument};
//! use std::path::Path;
//!
//! let loader = FsLoader;
//! let root = RawDocument::load(Path::new("specs/storage.json"), &loader).expect("load failed");
//! let canonical = Canonicalizer::new(&loader, CanonicalizeOptions::default())
//!     .canonicalize(&[root])
//!     .expect("canonicalization failed");
//! println!("{}", serde_json::to_string_pretty(&canonical.tree).unwrap());
//! ```

mod canonical;
mod expander;
mod host;
mod inheritance;
mod loader;
mod reference;
mod registry;

pub use canonical::{CanonicalDocument, CanonicalizeOptions, Canonicalizer};
pub use expander::{merge, SchemaExpander, SourceMapping, ANY_OF_KEY};
pub use host::{normalize_name, normalize_template, BODY_PARAMETER_NAME, HOST_KEY};
pub use inheritance::InheritanceMap;
pub use loader::{normalize_path, parse_source, DocumentLoader, DocumentStore, FsLoader, RawDocument};
pub use reference::{parse_reference, ReferenceMetadata, CIRCULAR_KEY};
pub use registry::{DefinitionRegistry, RegistryEntry, Resolver};
