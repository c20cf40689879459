//! Structural diff between two JSON trees
//!
//! Produces deep-diff style records: a value added (`N`), deleted (`D`) or
//! edited (`E`) at a path, or an element added to or removed from the tail of
//! an array (`A`). Object keys of the left side are walked first, in order,
//! followed by keys only present on the right.

use rest_api_diff_common::path::dotted;
use rest_api_diff_common::Segment;
use serde::Serialize;
use serde_json::Value;

/// The element change carried by an array edit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ArrayItem {
    #[serde(rename = "N")]
    New { rhs: Value },
    #[serde(rename = "D")]
    Deleted { lhs: Value },
}

/// One node-level difference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Difference {
    #[serde(rename = "N")]
    New { path: Vec<Segment>, rhs: Value },
    #[serde(rename = "D")]
    Deleted { path: Vec<Segment>, lhs: Value },
    #[serde(rename = "E")]
    Edited {
        path: Vec<Segment>,
        lhs: Value,
        rhs: Value,
    },
    #[serde(rename = "A")]
    Array {
        path: Vec<Segment>,
        index: usize,
        item: ArrayItem,
    },
}

/// The effective change of a difference, with array edits collapsed onto their item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    New,
    Deleted,
    Edited,
}

impl Difference {
    pub fn path(&self) -> &[Segment] {
        match self {
            Difference::New { path, .. }
            | Difference::Deleted { path, .. }
            | Difference::Edited { path, .. }
            | Difference::Array { path, .. } => path,
        }
    }

    pub fn change(&self) -> Change {
        match self {
            Difference::New { .. } | Difference::Array { item: ArrayItem::New { .. }, .. } => {
                Change::New
            }
            Difference::Deleted { .. }
            | Difference::Array {
                item: ArrayItem::Deleted { .. },
                ..
            } => Change::Deleted,
            Difference::Edited { .. } => Change::Edited,
        }
    }

    pub fn is_array_edit(&self) -> bool {
        matches!(self, Difference::Array { .. })
    }

    /// Left-hand value, absent for additions
    pub fn lhs(&self) -> Option<&Value> {
        match self {
            Difference::Deleted { lhs, .. } | Difference::Edited { lhs, .. } => Some(lhs),
            Difference::Array {
                item: ArrayItem::Deleted { lhs },
                ..
            } => Some(lhs),
            _ => None,
        }
    }

    /// Right-hand value, absent for deletions
    pub fn rhs(&self) -> Option<&Value> {
        match self {
            Difference::New { rhs, .. } | Difference::Edited { rhs, .. } => Some(rhs),
            Difference::Array {
                item: ArrayItem::New { rhs },
                ..
            } => Some(rhs),
            _ => None,
        }
    }

    /// Whichever side carries a value, preferring the left
    pub fn value(&self) -> Option<&Value> {
        self.lhs().or_else(|| self.rhs())
    }

    pub fn len(&self) -> usize {
        self.path().len()
    }

    pub fn is_empty(&self) -> bool {
        self.path().is_empty()
    }

    /// Key at position `index` from the root; `None` for array indices
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.path().get(index).and_then(Segment::as_key)
    }

    /// Key `offset` positions from the end (0 is the last segment)
    pub fn key_from_end(&self, offset: usize) -> Option<&str> {
        let path = self.path();
        path.len()
            .checked_sub(offset + 1)
            .and_then(|index| path[index].as_key())
    }

    pub fn last_key(&self) -> Option<&str> {
        self.key_from_end(0)
    }

    /// Whether the path contains `key` anywhere
    pub fn has_key(&self, key: &str) -> bool {
        self.path().iter().any(|segment| segment.is_key(key))
    }

    /// Dotted rendering of the path
    pub fn dotted(&self) -> String {
        dotted(self.path())
    }
}

/// Compute the differences between `lhs` and `rhs`
pub fn diff(lhs: &Value, rhs: &Value) -> Vec<Difference> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(&mut path, lhs, rhs, &mut out);
    out
}

fn walk(path: &mut Vec<Segment>, lhs: &Value, rhs: &Value, out: &mut Vec<Difference>) {
    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                path.push(Segment::Key(key.clone()));
                match right.get(key) {
                    Some(right_value) => walk(path, left_value, right_value, out),
                    None => out.push(Difference::Deleted {
                        path: path.clone(),
                        lhs: left_value.clone(),
                    }),
                }
                path.pop();
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    path.push(Segment::Key(key.clone()));
                    out.push(Difference::New {
                        path: path.clone(),
                        rhs: right_value.clone(),
                    });
                    path.pop();
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let common = left.len().min(right.len());
            for index in 0..common {
                path.push(Segment::Index(index));
                walk(path, &left[index], &right[index], out);
                path.pop();
            }
            for (index, value) in left.iter().enumerate().skip(common) {
                out.push(Difference::Array {
                    path: path.clone(),
                    index,
                    item: ArrayItem::Deleted { lhs: value.clone() },
                });
            }
            for (index, value) in right.iter().enumerate().skip(common) {
                out.push(Difference::Array {
                    path: path.clone(),
                    index,
                    item: ArrayItem::New { rhs: value.clone() },
                });
            }
        }
        (left, right) if left == right => {}
        (left, right) => out.push(Difference::Edited {
            path: path.clone(),
            lhs: left.clone(),
            rhs: right.clone(),
        }),
    }
}
