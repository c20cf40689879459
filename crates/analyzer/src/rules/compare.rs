//! Bidirectional comparisons: the verdict depends on the direction or value of a change

use super::support::{display, parent_name, tail_contains};
use super::RuleOutcome;
use crate::diff::{Change, Difference};
use serde_json::Value;

const CONSTRAINT_KEYS: &[&str] = &[
    "minLength",
    "maxLength",
    "pattern",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
];

/// Parameters that may gain a `minLength` without breaking callers
const MIN_LENGTH_ALLOWED: &[&str] = &["subscriptionid", "location", "resourcegroupname"];

fn is_empty_array(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

pub fn x_ms_identifiers(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.last_key() != Some("x-ms-identifiers") || difference.is_array_edit() {
        return RuleOutcome::Continue;
    }
    if is_empty_array(difference.lhs()) && is_empty_array(difference.rhs()) {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn x_ms_enum(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let path = difference.path();
    let Some(position) = path.iter().position(|segment| segment.is_key("x-ms-enum")) else {
        return RuleOutcome::Continue;
    };
    match path.get(position + 1) {
        Some(member) if member.is_key("modelAsString") => RuleOutcome::flagged_with(format!(
            "x-ms-enum.modelAsString changed from '{}' to '{}'.",
            display(difference.lhs()),
            display(difference.rhs())
        )),
        Some(_) => RuleOutcome::no_violation(),
        None => RuleOutcome::Continue,
    }
}

pub fn next_link_name_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let matches = difference.key_from_end(1) == Some("x-ms-pageable")
        && difference.last_key() == Some("nextLinkName")
        && difference.change() == Change::New
        && difference.rhs().and_then(Value::as_str) == Some("nextLink");
    if matches {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

/// NoViolation when `key` is the last segment and was deleted
fn removed(difference: &Difference, key: &str) -> RuleOutcome {
    if difference.last_key() == Some(key) && difference.change() == Change::Deleted {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn x_ms_odata_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    removed(difference, "x-ms-odata")
}

pub fn x_ms_azure_resource_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    removed(difference, "x-ms-azure-resource")
}

pub fn system_data_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.last_key() == Some("systemData") && difference.change() == Change::New {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn default_false_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let matches = difference.len() >= 3
        && difference.last_key() == Some("default")
        && difference.change() == Change::Deleted
        && difference.lhs() == Some(&Value::Bool(false));
    if matches {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

/// NoViolation when `key` toggles between absent and `false`
fn false_is_default(difference: &Difference, key: &str) -> RuleOutcome {
    if difference.last_key() != Some(key) {
        return RuleOutcome::Continue;
    }
    let default = Some(&Value::Bool(false));
    let equivalent = match difference.change() {
        Change::New => difference.rhs() == default,
        Change::Deleted => difference.lhs() == default,
        Change::Edited => false,
    };
    if equivalent {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn nullable_default(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    false_is_default(difference, "x-nullable")
}

pub fn long_running_operation_default(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    false_is_default(difference, "x-ms-long-running-operation")
}

/// A schema without `type` is unconstrained, which covers any declared type
pub fn type_omission(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let omitted = matches!(difference, Difference::New { .. } | Difference::Deleted { .. });
    if difference.last_key() == Some("type") && omitted {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn response_required(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if !tail_contains(difference, 2, "required") || !difference.has_key("responses") {
        return RuleOutcome::Continue;
    }
    match difference.change() {
        Change::New => RuleOutcome::no_violation(),
        Change::Deleted => RuleOutcome::flagged(),
        Change::Edited => RuleOutcome::Continue,
    }
}

/// A boolean `required` edited in place is left to `x-required-changed`
pub fn request_required(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if !tail_contains(difference, 2, "required") || !difference.has_key("parameters") {
        return RuleOutcome::Continue;
    }
    match difference.change() {
        Change::New => RuleOutcome::flagged(),
        Change::Deleted => RuleOutcome::no_violation(),
        Change::Edited => RuleOutcome::Continue,
    }
}

pub fn constraint_changed(difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome {
    let Some(constraint) = difference.last_key() else {
        return RuleOutcome::Continue;
    };
    if !CONSTRAINT_KEYS.contains(&constraint) || difference.len() < 3 {
        return RuleOutcome::Continue;
    }
    let name = parent_name(difference, rhs, lhs)
        .or_else(|| difference.key_from_end(1))
        .unwrap_or_default()
        .to_string();
    let lowered = name.to_lowercase();

    if constraint == "minLength"
        && difference.key_from_end(2) == Some("parameters")
        && MIN_LENGTH_ALLOWED.contains(&lowered.as_str())
    {
        return RuleOutcome::no_violation();
    }
    if constraint == "minimum"
        && difference.change() == Change::Deleted
        && difference.lhs().and_then(Value::as_f64) == Some(0.0)
    {
        return RuleOutcome::no_violation();
    }
    if constraint == "maxLength"
        && lowered == "resourcegroupname"
        && difference.change() == Change::New
        && difference.rhs().and_then(Value::as_u64) == Some(90)
    {
        return RuleOutcome::no_violation();
    }
    RuleOutcome::flagged_with(format!(
        "Constraint '{constraint}' changed for parameter '{name}'"
    ))
}

pub fn additional_properties_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.last_key() != Some("additionalProperties") {
        return RuleOutcome::Continue;
    }
    let empty_added = difference.change() == Change::New
        && difference
            .rhs()
            .and_then(Value::as_object)
            .is_some_and(|schema| schema.is_empty());
    if empty_added {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::flagged()
    }
}
