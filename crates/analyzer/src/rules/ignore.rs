//! Exemptions: differences that never affect the REST surface

use super::support::{is_parameter_field, parent_in, parent_name};
use super::RuleOutcome;
use crate::diff::{Change, Difference};
use rest_api_diff_common::json::lookup;
use rest_api_diff_common::{RegistryKind, Segment};
use serde_json::Value;

/// Last keys that carry documentation or client-generator metadata
const DOCUMENTATION_KEYS: &[&str] = &[
    "description",
    "examples",
    "operationId",
    "summary",
    "tags",
    "x-ms-client-default",
    "x-ms-client-flatten",
    "x-ms-client-name",
    "x-ms-code-generation-settings",
    "x-ms-enum",
    "x-ms-examples",
    "x-ms-parameter-grouping",
    "x-ms-parameter-location",
];

/// Path prefixes whose content never shapes requests or responses
const DOCUMENTATION_PREFIXES: &[&[&str]] = &[
    &["definitions"],
    &["externalDocs"],
    &["info", "title"],
    &["info", "description"],
    &["info", "termsOfService"],
    &["info", "contact"],
    &["info", "x-typespec-generated"],
    &["parameters"],
    &["responses"],
    &["securityDefinitions"],
    &["schemes"],
];

/// Headers a service may add to a success response for long-running operations
const LONG_RUNNING_HEADERS: &[&str] = &[
    "azure-asyncoperation",
    "location",
    "retry-after",
    "operation-location",
];

pub fn description(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    match difference.last_key() {
        Some("description") => RuleOutcome::no_violation(),
        _ => RuleOutcome::Continue,
    }
}

pub fn swagger_definitions(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    match difference.key_at(0) {
        Some(key) if RegistryKind::is_collection_key(key) => RuleOutcome::no_violation(),
        _ => RuleOutcome::Continue,
    }
}

pub fn swagger_properties(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if let Some(last) = difference.last_key() {
        if DOCUMENTATION_KEYS.contains(&last) {
            return RuleOutcome::no_violation();
        }
    }
    let path = difference.path();
    let ignored = DOCUMENTATION_PREFIXES.iter().any(|prefix| {
        path.len() >= prefix.len()
            && prefix
                .iter()
                .zip(path)
                .all(|(expected, segment)| segment.is_key(expected))
    });
    if ignored {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn tags(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let ignored = match difference.len() {
        1 | 4 => difference.last_key() == Some("tags"),
        5 => difference.key_from_end(1) == Some("tags"),
        _ => false,
    };
    if ignored {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn x_ms_examples(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.len() < 4 {
        return RuleOutcome::Continue;
    }
    if difference.last_key() == Some("$example") || difference.key_at(3) == Some("x-ms-examples") {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn irrelevant_response_properties(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    if difference.key_at(3) != Some("responses") {
        return RuleOutcome::Continue;
    }
    let irrelevant = match difference.last_key() {
        Some("x-nullable") => Value::Bool(false),
        Some("readOnly") => Value::Bool(true),
        _ => return RuleOutcome::Continue,
    };
    if difference.value() == Some(&irrelevant) {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

/// Added headers block, if this difference adds one
fn added_headers(difference: &Difference) -> Option<&serde_json::Map<String, Value>> {
    match difference {
        Difference::New { rhs, .. } if difference.last_key() == Some("headers") => rhs.as_object(),
        _ => None,
    }
}

pub fn x_ms_error_code_header(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    match added_headers(difference) {
        Some(headers) if headers.len() == 1 && headers.contains_key("x-ms-error-code") => {
            RuleOutcome::no_violation()
        }
        _ => RuleOutcome::Continue,
    }
}

pub fn long_running_headers(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let success = difference
        .key_from_end(1)
        .is_some_and(|status| status.starts_with('2'))
        && difference.key_from_end(2) == Some("responses");
    if !success {
        return RuleOutcome::Continue;
    }
    match added_headers(difference) {
        Some(headers)
            if !headers.is_empty()
                && headers
                    .keys()
                    .all(|name| LONG_RUNNING_HEADERS.contains(&name.to_lowercase().as_str())) =>
        {
            RuleOutcome::no_violation()
        }
        _ => RuleOutcome::Continue,
    }
}

pub fn api_version_min_length(difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome {
    if !is_parameter_field(difference, "minLength") {
        return RuleOutcome::Continue;
    }
    let (first, second) = if difference.lhs().is_some() {
        (lhs, rhs)
    } else {
        (rhs, lhs)
    };
    match parent_name(difference, first, second) {
        Some("api-version") => RuleOutcome::no_violation(),
        _ => RuleOutcome::Continue,
    }
}

pub fn format_uri(difference: &Difference, lhs: &Value, _: &Value) -> RuleOutcome {
    if difference.change() != Change::New || !is_parameter_field(difference, "format") {
        return RuleOutcome::Continue;
    }
    let skips_encoding = parent_in(difference, lhs)
        .and_then(|parameter| parameter.get("x-ms-skip-url-encoding"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if skips_encoding {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn next_link_format_uri(difference: &Difference, _: &Value, _: &Value) -> RuleOutcome {
    let path = difference.path();
    let tail = ["properties", "nextLink", "format"];
    let matches = difference.change() == Change::New
        && path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(segment, key)| segment.is_key(key));
    if matches {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

pub fn equivalent_arrays(difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome {
    let Difference::Edited { path, .. } = difference else {
        return RuleOutcome::Continue;
    };
    if path.len() < 2 || !matches!(path.last(), Some(Segment::Index(_))) {
        return RuleOutcome::Continue;
    }
    let array_path = &path[..path.len() - 1];
    let (Some(left), Some(right)) = (
        lookup(lhs, array_path).and_then(sorted_strings),
        lookup(rhs, array_path).and_then(sorted_strings),
    ) else {
        return RuleOutcome::Continue;
    };
    if left == right {
        RuleOutcome::no_violation()
    } else {
        RuleOutcome::Continue
    }
}

fn sorted_strings(value: &Value) -> Option<Vec<&str>> {
    let mut items = value
        .as_array()?
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()?;
    items.sort_unstable();
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use serde_json::json;

    fn edit(path: &[&str], lhs: Value, rhs: Value) -> Difference {
        Difference::Edited {
            path: path.iter().map(|key| Segment::from(*key)).collect(),
            lhs,
            rhs,
        }
    }

    fn added(path: &[&str], rhs: Value) -> Difference {
        Difference::New {
            path: path.iter().map(|key| Segment::from(*key)).collect(),
            rhs,
        }
    }

    #[test]
    fn test_swagger_properties_prefix_is_segment_aligned() {
        let doc = json!({});
        let title = edit(&["info", "title"], json!("a"), json!("b"));
        assert!(swagger_properties(&title, &doc, &doc).is_decisive());
        let version = edit(&["info", "version"], json!("1"), json!("2"));
        assert_eq!(swagger_properties(&version, &doc, &doc), RuleOutcome::Continue);
        let lookalike = edit(&["parametersX", "a"], json!(1), json!(2));
        assert_eq!(swagger_properties(&lookalike, &doc, &doc), RuleOutcome::Continue);
        let client_name = added(&["paths", "/a", "get", "x-ms-client-name"], json!("A"));
        assert!(swagger_properties(&client_name, &doc, &doc).is_decisive());
    }

    #[test]
    fn test_tags_positions() {
        let doc = json!({});
        assert!(tags(&added(&["tags"], json!([])), &doc, &doc).is_decisive());
        assert!(tags(&added(&["paths", "/a", "get", "tags"], json!([])), &doc, &doc).is_decisive());
        let item = Difference::Edited {
            path: vec![
                Segment::from("paths"),
                Segment::from("/a"),
                Segment::from("get"),
                Segment::from("tags"),
                Segment::Index(0),
            ],
            lhs: json!("x"),
            rhs: json!("y"),
        };
        assert!(tags(&item, &doc, &doc).is_decisive());
        assert_eq!(
            tags(&added(&["paths", "/a", "tags"], json!([])), &doc, &doc),
            RuleOutcome::Continue
        );
    }

    #[test]
    fn test_error_code_header_alone() {
        let doc = json!({});
        let path = ["paths", "/a", "get", "responses", "default", "headers"];
        let alone = added(&path, json!({"x-ms-error-code": {"type": "string"}}));
        assert!(x_ms_error_code_header(&alone, &doc, &doc).is_decisive());
        let mixed = added(&path, json!({"x-ms-error-code": {}, "ETag": {}}));
        assert_eq!(x_ms_error_code_header(&mixed, &doc, &doc), RuleOutcome::Continue);
    }

    #[test]
    fn test_long_running_headers_on_success() {
        let doc = json!({});
        let headers = json!({"Azure-AsyncOperation": {"type": "string"}, "retry-after": {"type": "integer"}});
        let accepted = added(&["paths", "/a", "put", "responses", "202", "headers"], headers.clone());
        assert!(long_running_headers(&accepted, &doc, &doc).is_decisive());
        let failure = added(&["paths", "/a", "put", "responses", "default", "headers"], headers);
        assert_eq!(long_running_headers(&failure, &doc, &doc), RuleOutcome::Continue);
        let other = added(
            &["paths", "/a", "put", "responses", "200", "headers"],
            json!({"ETag": {"type": "string"}}),
        );
        assert_eq!(long_running_headers(&other, &doc, &doc), RuleOutcome::Continue);
    }

    #[test]
    fn test_api_version_min_length() {
        let lhs = json!({"paths": {"/a": {"get": {"parameters": [
            {"name": "api-version", "in": "query", "type": "string"}
        ]}}}});
        let rhs = json!({"paths": {"/a": {"get": {"parameters": [
            {"name": "api-version", "in": "query", "type": "string", "minLength": 1}
        ]}}}});
        let differences = diff(&lhs, &rhs);
        assert_eq!(differences.len(), 1);
        assert!(api_version_min_length(&differences[0], &lhs, &rhs).is_decisive());
    }

    #[test]
    fn test_format_uri_needs_skip_encoding() {
        let lhs = json!({"paths": {"/a": {"get": {"parameters": [
            {"name": "next", "in": "path", "type": "string", "x-ms-skip-url-encoding": true}
        ]}}}});
        let rhs = json!({"paths": {"/a": {"get": {"parameters": [
            {"name": "next", "in": "path", "type": "string", "x-ms-skip-url-encoding": true, "format": "uri"}
        ]}}}});
        let differences = diff(&lhs, &rhs);
        assert!(format_uri(&differences[0], &lhs, &rhs).is_decisive());

        let plain = json!({"paths": {"/a": {"get": {"parameters": [
            {"name": "next", "in": "path", "type": "string"}
        ]}}}});
        assert_eq!(format_uri(&differences[0], &plain, &rhs), RuleOutcome::Continue);
    }

    #[test]
    fn test_equivalent_arrays() {
        let lhs = json!({"a": {"enum": ["x", "y"]}});
        let rhs = json!({"a": {"enum": ["y", "x"]}});
        let differences = diff(&lhs, &rhs);
        assert_eq!(differences.len(), 2);
        for difference in &differences {
            assert!(equivalent_arrays(difference, &lhs, &rhs).is_decisive());
        }

        let changed = json!({"a": {"enum": ["y", "z"]}});
        let differences = diff(&lhs, &changed);
        assert!(differences
            .iter()
            .all(|d| equivalent_arrays(d, &lhs, &changed) == RuleOutcome::Continue));
    }

    #[test]
    fn test_irrelevant_response_properties() {
        let doc = json!({});
        let path = ["paths", "/a", "get", "responses", "200", "schema", "readOnly"];
        assert!(irrelevant_response_properties(&added(&path, json!(true)), &doc, &doc).is_decisive());
        assert_eq!(
            irrelevant_response_properties(&added(&path, json!(false)), &doc, &doc),
            RuleOutcome::Continue
        );
    }
}
