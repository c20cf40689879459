//! Path tracking for positions inside a Swagger document
//!
//! A [`SwaggerPath`] is an immutable, parent-linked label created at each step
//! of a tree walk. Its [`PathKind`] records what role the final segment plays,
//! which the classifier uses to decide whether name-based rules may look at it.

use crate::RegistryKind;
use serde::{Serialize, Serializer};
use std::fmt;
use std::rc::Rc;

/// The role of a single path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// A Swagger keyword or extension name. Can be filtered.
    SwaggerProperty,
    /// A definition, parameter, response or security scheme name.
    DefinitionKey,
    /// A user-chosen schema property name.
    PropertyKey,
    /// An array index.
    ArrayIndex,
    /// A path template under `paths`.
    OperationKey,
}

impl PathKind {
    /// Whether rules that match on key names may inspect this position
    pub fn is_filterable(self) -> bool {
        !matches!(self, PathKind::DefinitionKey | PathKind::PropertyKey)
    }
}

/// One step of a path through a JSON tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.as_key() == Some(name)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Segment::Key(key) => serializer.serialize_str(key),
            Segment::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

/// Render segments as a dotted path (`paths./pets.get.responses`)
pub fn dotted(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(Segment::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// An immutable, parent-linked position in a Swagger document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwaggerPath {
    name: String,
    kind: PathKind,
    parent: Option<Rc<SwaggerPath>>,
}

impl SwaggerPath {
    /// Create a root-level path node
    pub fn root(name: impl Into<String>, kind: PathKind) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            kind,
            parent: None,
        })
    }

    /// Create a child of `parent`
    pub fn child(parent: &Rc<Self>, name: impl Into<String>, kind: PathKind) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            kind,
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Build the tracked path for a segment list walked from the document root.
    ///
    /// Returns `None` for the empty path.
    pub fn from_segments(segments: &[Segment]) -> Option<Rc<Self>> {
        let mut current: Option<Rc<Self>> = None;
        for segment in segments {
            let kind = match (&current, segment) {
                (_, Segment::Index(_)) => PathKind::ArrayIndex,
                (None, Segment::Key(_)) => PathKind::SwaggerProperty,
                (Some(parent), Segment::Key(_)) => Self::kind_below(parent),
            };
            let name = segment.to_string();
            current = Some(match current {
                Some(parent) => Self::child(&parent, name, kind),
                None => Self::root(name, kind),
            });
        }
        current
    }

    fn kind_below(parent: &SwaggerPath) -> PathKind {
        if parent.parent.is_none() {
            if RegistryKind::is_collection_key(&parent.name) {
                return PathKind::DefinitionKey;
            }
            if parent.name == "paths" {
                return PathKind::OperationKey;
            }
        }
        if parent.name == "properties" && parent.kind == PathKind::SwaggerProperty {
            return PathKind::PropertyKey;
        }
        PathKind::SwaggerProperty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&SwaggerPath> {
        self.parent.as_deref()
    }

    /// Number of segments from the root, inclusive
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Render the dotted ancestor chain
    pub fn full_path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}.{}", parent.full_path(), self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<Segment> {
        names.iter().map(|n| Segment::from(*n)).collect()
    }

    #[test]
    fn test_full_path() {
        let root = SwaggerPath::root("paths", PathKind::SwaggerProperty);
        let op = SwaggerPath::child(&root, "/pets", PathKind::OperationKey);
        let verb = SwaggerPath::child(&op, "get", PathKind::SwaggerProperty);
        assert_eq!(verb.full_path(), "paths./pets.get");
        assert_eq!(verb.depth(), 3);
        assert_eq!(verb.parent().map(|p| p.kind()), Some(PathKind::OperationKey));
    }

    #[test]
    fn test_kinds_from_segments() {
        let path = SwaggerPath::from_segments(&keys(&["definitions", "Pet"])).unwrap();
        assert_eq!(path.kind(), PathKind::DefinitionKey);

        let path = SwaggerPath::from_segments(&keys(&["paths", "/pets"])).unwrap();
        assert_eq!(path.kind(), PathKind::OperationKey);

        let path = SwaggerPath::from_segments(&keys(&[
            "paths", "/pets", "get", "responses", "200", "schema", "properties", "name",
        ]))
        .unwrap();
        assert_eq!(path.kind(), PathKind::PropertyKey);
        assert!(!path.kind().is_filterable());
    }

    #[test]
    fn test_property_named_properties() {
        // a user property called "properties" does not make its children user properties
        let path = SwaggerPath::from_segments(&keys(&[
            "paths", "/a", "get", "properties", "properties", "type",
        ]))
        .unwrap();
        assert_eq!(path.kind(), PathKind::SwaggerProperty);
        assert_eq!(path.parent().unwrap().kind(), PathKind::PropertyKey);
    }

    #[test]
    fn test_array_index_segments() {
        let segments = vec![
            Segment::from("paths"),
            Segment::from("/a"),
            Segment::from("get"),
            Segment::from("parameters"),
            Segment::Index(0),
        ];
        let path = SwaggerPath::from_segments(&segments).unwrap();
        assert_eq!(path.kind(), PathKind::ArrayIndex);
        assert_eq!(path.full_path(), "paths./a.get.parameters.0");
        assert_eq!(dotted(&segments), "paths./a.get.parameters.0");
    }

    #[test]
    fn test_empty_segments() {
        assert!(SwaggerPath::from_segments(&[]).is_none());
    }
}
