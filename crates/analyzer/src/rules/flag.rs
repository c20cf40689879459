//! Flags: structural changes that break existing callers

use super::support::{display, tail_contains};
use super::RuleOutcome;
use crate::diff::{Change, Difference};
use rest_api_diff_common::Segment;
use serde_json::Value;

fn flag_if(condition: bool) -> RuleOutcome {
    if condition {
        RuleOutcome::flagged()
    } else {
        RuleOutcome::Continue
    }
}

fn last_is(difference: &Difference, key: &str) -> bool {
    difference.last_key() == Some(key)
}

/// The difference touches `key` itself or one of its array items
fn targets(difference: &Difference, key: &str) -> bool {
    match difference.path().last() {
        Some(Segment::Index(_)) => difference.key_from_end(1) == Some(key),
        _ => last_is(difference, key),
    }
}

pub fn any_of_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(tail_contains(difference, 2, "$anyOf"))
}

pub fn consumes_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(targets(difference, "consumes"))
}

pub fn produces_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(targets(difference, "produces"))
}

pub fn enum_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(last_is(difference, "enum") && difference.change() == Change::New)
}

pub fn format_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(last_is(difference, "format"))
}

pub fn headers_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(tail_contains(difference, 2, "headers") && difference.change() == Change::New)
}

pub fn x_ms_identifiers_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(targets(difference, "x-ms-identifiers"))
}

pub fn long_running_operation_options_changed(
    difference: &Difference,
    _: &Value,
    _: &Value,
) -> RuleOutcome {
    flag_if(last_is(difference, "x-ms-long-running-operation-options"))
}

pub fn mutability_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(last_is(difference, "x-ms-mutability") && difference.change() == Change::New)
}

pub fn mutability_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(tail_contains(difference, 2, "x-ms-mutability"))
}

pub fn secret_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(last_is(difference, "x-ms-secret"))
}

pub fn name_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(
        difference.len() >= 2
            && last_is(difference, "name")
            && difference.key_from_end(1) != Some("x-ms-enum")
            && difference.change() == Change::Edited,
    )
}

pub fn parameter_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(difference.len() == 4 && last_is(difference, "parameters"))
}

pub fn parameter_in_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(difference.len() == 6 && last_is(difference, "in"))
}

pub fn parameter_schema_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(difference.len() == 6 && last_is(difference, "schema"))
}

fn is_path_entry(difference: &Difference) -> bool {
    difference.len() == 2 && difference.key_at(0) == Some("paths")
}

pub fn path_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(is_path_entry(difference) && difference.change() == Change::New)
}

pub fn path_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(is_path_entry(difference) && difference.change() == Change::Deleted)
}

/// The property name when the difference sits directly under `properties`
fn property_name(difference: &Difference) -> Option<&str> {
    if difference.len() < 3 || difference.key_from_end(1) != Some("properties") {
        return None;
    }
    difference.last_key()
}

pub fn property_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    match property_name(difference) {
        Some(name) if difference.change() == Change::New => {
            RuleOutcome::flagged_with(format!("Property missing from LHS: {name}"))
        }
        _ => RuleOutcome::Continue,
    }
}

pub fn property_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    match property_name(difference) {
        Some(name) if difference.change() == Change::Deleted => {
            RuleOutcome::flagged_with(format!("Property missing from RHS: {name}"))
        }
        _ => RuleOutcome::Continue,
    }
}

pub fn read_only_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.len() < 4 || difference.key_at(3) == Some("responses") {
        return RuleOutcome::Continue;
    }
    if !last_is(difference, "readOnly") {
        return RuleOutcome::Continue;
    }
    match difference.change() {
        Change::Deleted => RuleOutcome::no_violation(),
        _ => RuleOutcome::flagged(),
    }
}

pub fn required_changed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(targets(difference, "required"))
}

fn is_response_entry(difference: &Difference) -> bool {
    difference.len() == 5 && difference.key_at(3) == Some("responses")
}

pub fn response_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(is_response_entry(difference) && difference.change() == Change::New)
}

pub fn response_removed(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(is_response_entry(difference) && difference.change() == Change::Deleted)
}

pub fn security_added(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    flag_if(last_is(difference, "security") && difference.change() == Change::New)
}

pub fn type_differences(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if !last_is(difference, "type") {
        return RuleOutcome::Continue;
    }
    RuleOutcome::flagged_with(format!(
        "Type changed from '{}' to '{}'.",
        display(difference.lhs()),
        display(difference.rhs())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<Segment> {
        names.iter().map(|name| Segment::from(*name)).collect()
    }

    #[test]
    fn test_property_messages() {
        let doc = json!({});
        let added = Difference::New {
            path: keys(&["paths", "/a", "get", "responses", "200", "schema", "properties", "etag"]),
            rhs: json!({"type": "string"}),
        };
        assert_eq!(
            property_added(&added, &doc, &doc),
            RuleOutcome::flagged_with("Property missing from LHS: etag")
        );
        assert_eq!(property_removed(&added, &doc, &doc), RuleOutcome::Continue);
    }

    #[test]
    fn test_path_and_response_positions() {
        let doc = json!({});
        let path = Difference::Deleted {
            path: keys(&["paths", "/a"]),
            lhs: json!({}),
        };
        assert_eq!(path_removed(&path, &doc, &doc), RuleOutcome::flagged());
        assert_eq!(path_added(&path, &doc, &doc), RuleOutcome::Continue);

        let response = Difference::New {
            path: keys(&["paths", "/a", "get", "responses", "404"]),
            rhs: json!({}),
        };
        assert_eq!(response_added(&response, &doc, &doc), RuleOutcome::flagged());
    }

    #[test]
    fn test_name_changed_skips_enum_name() {
        let doc = json!({});
        let enum_name = Difference::Edited {
            path: keys(&["definitions", "A", "x-ms-enum", "name"]),
            lhs: json!("A"),
            rhs: json!("B"),
        };
        assert_eq!(name_changed(&enum_name, &doc, &doc), RuleOutcome::Continue);
    }

    #[test]
    fn test_type_message_for_omission() {
        let doc = json!({});
        let removed = Difference::Deleted {
            path: keys(&["definitions", "A", "type"]),
            lhs: json!("string"),
        };
        assert_eq!(
            type_differences(&removed, &doc, &doc),
            RuleOutcome::flagged_with("Type changed from 'string' to 'undefined'.")
        );
    }

    #[test]
    fn test_media_type_items() {
        let doc = json!({});
        let item = Difference::Edited {
            path: vec![
                Segment::from("paths"),
                Segment::from("/a"),
                Segment::from("get"),
                Segment::from("produces"),
                Segment::Index(0),
            ],
            lhs: json!("application/json"),
            rhs: json!("text/plain"),
        };
        assert_eq!(produces_changed(&item, &doc, &doc), RuleOutcome::flagged());
        assert_eq!(consumes_changed(&item, &doc, &doc), RuleOutcome::Continue);
    }

    #[test]
    fn test_read_only_outside_responses() {
        let doc = json!({});
        let removed = Difference::Deleted {
            path: keys(&["paths", "/a", "put", "parameters", "x", "readOnly"]),
            lhs: json!(true),
        };
        assert_eq!(read_only_changed(&removed, &doc, &doc), RuleOutcome::no_violation());
        let added = Difference::New {
            path: keys(&["paths", "/a", "put", "parameters", "x", "readOnly"]),
            rhs: json!(true),
        };
        assert_eq!(read_only_changed(&added, &doc, &doc), RuleOutcome::flagged());
    }
}
