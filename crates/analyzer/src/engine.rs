//! Diff classification
//!
//! Every structural difference between two canonical documents passes a gate
//! and then the rule chain, landing in exactly one verdict bucket.

use crate::diff::{diff, Difference};
use crate::rules::RuleChain;
use crate::suppression::SuppressionList;
use rest_api_diff_common::{PathKind, Segment, SwaggerPath};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Final classification of a difference.
///
/// A difference no rule decides is an `AssumedViolation` and carries no rule
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    FlaggedViolation,
    AssumedViolation,
    NoViolation,
}

impl Verdict {
    pub fn is_violation(self) -> bool {
        !matches!(self, Verdict::NoViolation)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::FlaggedViolation => write!(f, "flagged violation"),
            Verdict::AssumedViolation => write!(f, "assumed violation"),
            Verdict::NoViolation => write!(f, "no violation"),
        }
    }
}

/// How a difference is admitted to the rule chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Evaluate with the full chain
    Evaluate,
    /// The leaf is a user-chosen property name; only positional rules apply
    PositionalOnly,
    /// Residual noise under a stripped named collection
    Drop,
}

/// Decide how a difference at `path` is classified.
///
/// A leaf directly under a schema `properties` keyword is a user-chosen name,
/// so it never reaches the key-matching rules: only positional rules such as
/// `x-property-added` and `x-property-removed` see it.
pub fn gate(path: &[Segment]) -> Gate {
    if path.len() < 2 {
        return Gate::Evaluate;
    }
    match SwaggerPath::from_segments(path).map(|leaf| leaf.kind()) {
        Some(PathKind::DefinitionKey) => Gate::Drop,
        Some(PathKind::PropertyKey) => Gate::PositionalOnly,
        _ => Gate::Evaluate,
    }
}

/// A difference together with its verdict and attribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedDifference {
    #[serde(rename = "ruleResult")]
    pub verdict: Verdict,
    #[serde(rename = "ruleName", skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Reason of the suppression entry that matched, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<String>,
    #[serde(rename = "diff")]
    pub difference: Difference,
}

impl ClassifiedDifference {
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.is_some()
    }

    /// Rule name, or an automatic grouping name for unattributed differences
    pub fn group_name(&self) -> String {
        match &self.rule {
            Some(rule) => rule.clone(),
            None => auto_group_name(&self.difference),
        }
    }
}

/// `<Verb>_<key> (AUTO)`, naming the last key (or the array holding the last index)
pub fn auto_group_name(difference: &Difference) -> String {
    let key = difference
        .last_key()
        .or_else(|| difference.key_from_end(1))
        .unwrap_or_default();
    match difference {
        Difference::New { .. } => format!("Added_{key} (AUTO)"),
        Difference::Deleted { .. } => format!("Removed_{key} (AUTO)"),
        Difference::Edited { .. } => format!("Changed_{key} (AUTO)"),
        Difference::Array { .. } => {
            let verb = match difference.change() {
                crate::diff::Change::New => "Added",
                _ => "Removed",
            };
            format!("ArrayItem_{verb}_{key} (AUTO)")
        }
    }
}

/// Ordered classification results for one comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub results: Vec<ClassifiedDifference>,
    /// Differences discarded by the gate
    pub dropped: usize,
}

impl Classification {
    fn bucket(&self, verdict: Verdict) -> impl Iterator<Item = &ClassifiedDifference> {
        self.results
            .iter()
            .filter(move |result| result.verdict == verdict && !result.is_suppressed())
    }

    pub fn flagged(&self) -> impl Iterator<Item = &ClassifiedDifference> {
        self.bucket(Verdict::FlaggedViolation)
    }

    pub fn assumed(&self) -> impl Iterator<Item = &ClassifiedDifference> {
        self.bucket(Verdict::AssumedViolation)
    }

    pub fn no_violations(&self) -> impl Iterator<Item = &ClassifiedDifference> {
        self.bucket(Verdict::NoViolation)
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &ClassifiedDifference> {
        self.results.iter().filter(|result| result.is_suppressed())
    }

    /// Unsuppressed flagged and assumed violations, in diff order
    pub fn violations(&self) -> impl Iterator<Item = &ClassifiedDifference> {
        self.results
            .iter()
            .filter(|result| result.verdict.is_violation() && !result.is_suppressed())
    }

    pub fn has_violations(&self) -> bool {
        self.violations().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Remove matching violations from the violation buckets.
    ///
    /// Returns the number of newly suppressed differences.
    pub fn apply_suppressions(&mut self, suppressions: &SuppressionList) -> usize {
        let mut count = 0;
        for result in &mut self.results {
            if !result.verdict.is_violation() || result.is_suppressed() {
                continue;
            }
            if let Some(entry) = suppressions.find(&result.difference.dotted()) {
                debug!(path = %result.difference.dotted(), entry = %entry.path, "suppressed");
                result.suppressed = Some(entry.reason.clone());
                count += 1;
            }
        }
        debug_assert_eq!(
            self.flagged().count()
                + self.assumed().count()
                + self.no_violations().count()
                + self.suppressed().count(),
            self.results.len()
        );
        count
    }
}

/// Classifies differences with a rule chain
pub struct DiffEngine {
    chain: RuleChain,
}

impl DiffEngine {
    pub fn new(chain: RuleChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &RuleChain {
        &self.chain
    }

    /// Diff `lhs` against `rhs` and classify every difference
    pub fn classify(&self, lhs: &Value, rhs: &Value) -> Classification {
        let differences = diff(lhs, rhs);
        debug!(count = differences.len(), "structural differences");
        let mut classification = Classification::default();
        for difference in differences {
            match self.classify_difference(difference, lhs, rhs) {
                Some(result) => classification.results.push(result),
                None => classification.dropped += 1,
            }
        }
        classification
    }

    /// Classify a single difference; `None` when the gate drops it
    pub fn classify_difference(
        &self,
        difference: Difference,
        lhs: &Value,
        rhs: &Value,
    ) -> Option<ClassifiedDifference> {
        let positional_only = match gate(difference.path()) {
            Gate::Drop => return None,
            Gate::PositionalOnly => true,
            Gate::Evaluate => false,
        };
        let (verdict, rule, message) =
            match self.chain.evaluate(&difference, lhs, rhs, positional_only) {
                Some(decision) => (
                    decision.verdict,
                    Some(decision.rule.to_string()),
                    decision.message,
                ),
                None => (Verdict::AssumedViolation, None, None),
            };
        Some(ClassifiedDifference {
            verdict,
            rule,
            message,
            suppressed: None,
            difference,
        })
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(RuleChain::default_rules())
    }
}
