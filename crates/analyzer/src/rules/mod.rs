//! Ordered classification rules
//!
//! Each rule inspects one [`Difference`] together with both canonical
//! documents and either decides a verdict or defers to the next rule. The
//! chain order is the only coupling between rules.

mod compare;
mod flag;
mod ignore;

use crate::diff::Difference;
use crate::engine::Verdict;
use serde_json::Value;
use tracing::trace;

/// Result of evaluating a single rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Not decisive; pass to the next rule
    Continue,
    /// The difference is safe
    NoViolation(Option<String>),
    /// The difference breaks compatibility
    Flagged(Option<String>),
}

impl RuleOutcome {
    pub fn no_violation() -> Self {
        RuleOutcome::NoViolation(None)
    }

    pub fn flagged() -> Self {
        RuleOutcome::Flagged(None)
    }

    pub fn flagged_with(message: impl Into<String>) -> Self {
        RuleOutcome::Flagged(Some(message.into()))
    }

    pub fn is_decisive(&self) -> bool {
        !matches!(self, RuleOutcome::Continue)
    }

    /// The verdict and message of a decisive outcome
    pub fn into_verdict(self) -> Option<(Verdict, Option<String>)> {
        match self {
            RuleOutcome::Continue => None,
            RuleOutcome::NoViolation(message) => Some((Verdict::NoViolation, message)),
            RuleOutcome::Flagged(message) => Some((Verdict::FlaggedViolation, message)),
        }
    }
}

/// A single classification rule
#[cfg_attr(test, mockall::automock)]
pub trait Rule {
    /// Stable, kebab-case rule name used for attribution and disabling
    fn name(&self) -> &'static str;

    /// Positional rules reason about where a difference sits rather than the
    /// name of its last key, so they may see user-chosen property names.
    fn positional(&self) -> bool;

    fn evaluate(&self, difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome;
}

type RuleFn = fn(&Difference, &Value, &Value) -> RuleOutcome;

/// A rule backed by a plain function
pub struct FnRule {
    name: &'static str,
    positional: bool,
    check: RuleFn,
}

impl FnRule {
    pub const fn new(name: &'static str, check: RuleFn) -> Self {
        Self {
            name,
            positional: false,
            check,
        }
    }

    pub const fn positional(name: &'static str, check: RuleFn) -> Self {
        Self {
            name,
            positional: true,
            check,
        }
    }
}

impl Rule for FnRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn positional(&self) -> bool {
        self.positional
    }

    fn evaluate(&self, difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome {
        (self.check)(difference, lhs, rhs)
    }
}

/// The decision reached by a chain, with the deciding rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDecision {
    pub rule: &'static str,
    pub verdict: Verdict,
    pub message: Option<String>,
}

/// Rules evaluated in a fixed priority order
pub struct RuleChain {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleChain {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The built-in chain: exemptions, then comparisons, then flags
    pub fn default_rules() -> Self {
        let rules: Vec<FnRule> = vec![
            FnRule::new("ignore-description", ignore::description),
            FnRule::positional("ignore-swagger-definitions", ignore::swagger_definitions),
            FnRule::new("ignore-swagger-properties", ignore::swagger_properties),
            FnRule::new("ignore-tags", ignore::tags),
            FnRule::new("ignore-x-ms-examples", ignore::x_ms_examples),
            FnRule::new(
                "ignore-irrelevant-response-properties",
                ignore::irrelevant_response_properties,
            ),
            FnRule::new("ignore-x-ms-error-code-header", ignore::x_ms_error_code_header),
            FnRule::new("ignore-long-running-headers", ignore::long_running_headers),
            FnRule::new("ignore-api-version-min-length", ignore::api_version_min_length),
            FnRule::new("ignore-format-uri", ignore::format_uri),
            FnRule::new("ignore-next-link-format-uri", ignore::next_link_format_uri),
            FnRule::new("ignore-equivalent-arrays", ignore::equivalent_arrays),
            FnRule::new("compare-x-ms-identifiers", compare::x_ms_identifiers),
            FnRule::new("compare-x-ms-enum", compare::x_ms_enum),
            FnRule::new("x-next-link-name-added", compare::next_link_name_added),
            FnRule::new("x-ms-odata-removed", compare::x_ms_odata_removed),
            FnRule::new("x-ms-azure-resource-removed", compare::x_ms_azure_resource_removed),
            FnRule::positional("x-system-data-added", compare::system_data_added),
            FnRule::new("x-default-false-removed", compare::default_false_removed),
            FnRule::new("x-nullable-default", compare::nullable_default),
            FnRule::new(
                "x-ms-long-running-operation-default",
                compare::long_running_operation_default,
            ),
            FnRule::new("ignore-type-omission", compare::type_omission),
            FnRule::new("compare-response-required", compare::response_required),
            FnRule::new("compare-request-required", compare::request_required),
            FnRule::new("x-constraint-changed", compare::constraint_changed),
            FnRule::new(
                "x-additional-properties-changed",
                compare::additional_properties_changed,
            ),
            FnRule::new("x-any-of-changed", flag::any_of_changed),
            FnRule::new("x-consumes-changed", flag::consumes_changed),
            FnRule::new("x-produces-changed", flag::produces_changed),
            FnRule::new("x-enum-added", flag::enum_added),
            FnRule::new("x-format-changed", flag::format_changed),
            FnRule::new("x-headers-added", flag::headers_added),
            FnRule::new("x-ms-identifiers-changed", flag::x_ms_identifiers_changed),
            FnRule::new(
                "x-ms-long-running-operation-options-changed",
                flag::long_running_operation_options_changed,
            ),
            FnRule::new("x-ms-mutability-added", flag::mutability_added),
            FnRule::new("x-ms-mutability-changed", flag::mutability_changed),
            FnRule::new("x-ms-secret-changed", flag::secret_changed),
            FnRule::new("x-name-changed", flag::name_changed),
            FnRule::new("x-parameter-changed", flag::parameter_changed),
            FnRule::new("x-parameter-in-changed", flag::parameter_in_changed),
            FnRule::new("x-parameter-schema-changed", flag::parameter_schema_changed),
            FnRule::new("x-path-added", flag::path_added),
            FnRule::new("x-path-removed", flag::path_removed),
            FnRule::positional("x-property-added", flag::property_added),
            FnRule::positional("x-property-removed", flag::property_removed),
            FnRule::new("x-read-only-changed", flag::read_only_changed),
            FnRule::new("x-required-changed", flag::required_changed),
            FnRule::new("x-response-added", flag::response_added),
            FnRule::new("x-response-removed", flag::response_removed),
            FnRule::new("x-security-added", flag::security_added),
            FnRule::new("flag-type-differences", flag::type_differences),
        ];
        Self::new(
            rules
                .into_iter()
                .map(|rule| Box::new(rule) as Box<dyn Rule>)
                .collect(),
        )
    }

    /// Drop the named rules from the chain
    pub fn without<S: AsRef<str>>(mut self, disabled: &[S]) -> Self {
        self.rules
            .retain(|rule| !disabled.iter().any(|name| name.as_ref() == rule.name()));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate rules in order until one decides.
    ///
    /// With `positional_only`, rules that match on key names are skipped.
    pub fn evaluate(
        &self,
        difference: &Difference,
        lhs: &Value,
        rhs: &Value,
        positional_only: bool,
    ) -> Option<ChainDecision> {
        for rule in &self.rules {
            if positional_only && !rule.positional() {
                continue;
            }
            if let Some((verdict, message)) = rule.evaluate(difference, lhs, rhs).into_verdict() {
                trace!(rule = rule.name(), path = %difference.dotted(), %verdict, "rule decided");
                return Some(ChainDecision {
                    rule: rule.name(),
                    verdict,
                    message,
                });
            }
        }
        None
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::default_rules()
    }
}

/// Shared helpers for rule implementations
pub(crate) mod support {
    use crate::diff::Difference;
    use rest_api_diff_common::json::lookup;
    use rest_api_diff_common::Segment;
    use serde_json::Value;

    /// The object enclosing the difference's last segment, looked up in `doc`
    pub fn parent_in<'a>(difference: &Difference, doc: &'a Value) -> Option<&'a Value> {
        let path = difference.path();
        let parent = path.get(..path.len().checked_sub(1)?)?;
        lookup(doc, parent)
    }

    /// The enclosing object's `name`, preferring the given side
    pub fn parent_name<'a>(
        difference: &Difference,
        first: &'a Value,
        second: &'a Value,
    ) -> Option<&'a str> {
        [first, second]
            .into_iter()
            .filter_map(|doc| parent_in(difference, doc))
            .find_map(|parent| parent.get("name").and_then(Value::as_str))
    }

    /// Whether the path contains `parameters.<index>.<key>` with `key` last
    pub fn is_parameter_field(difference: &Difference, key: &str) -> bool {
        let path = difference.path();
        path.len() >= 3
            && path[path.len() - 1].is_key(key)
            && matches!(path[path.len() - 2], Segment::Index(_))
            && path[path.len() - 3].is_key("parameters")
    }

    /// Whether any of the last `count` segments is `key`
    pub fn tail_contains(difference: &Difference, count: usize, key: &str) -> bool {
        let path = difference.path();
        path.len() >= count
            && path[path.len() - count..]
                .iter()
                .any(|segment| segment.is_key(key))
    }

    /// Render a value the way messages quote it; absent values read `undefined`
    pub fn display(value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => "undefined".to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}
