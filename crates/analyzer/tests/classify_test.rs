//! End-to-end classification tests

use rest_api_diff_analyzer::{
    ApiDiff, DiffEngine, Difference, Rule, RuleChain, RuleOutcome, SuppressionList, Verdict,
};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// A single-path document whose response schema has one `status` property
fn widget_api(status: Value) -> Value {
    json!({
        "swagger": "2.0",
        "info": {"title": "Widgets", "version": "2024-01-01"},
        "paths": {
            "/widgets/{widgetName}": {
                "get": {
                    "operationId": "Widgets_Get",
                    "parameters": [
                        {"name": "widgetName", "in": "path", "required": true, "type": "string"}
                    ],
                    "responses": {
                        "200": {"description": "OK", "schema": {"$ref": "#/definitions/Widget"}}
                    }
                }
            }
        },
        "definitions": {
            "Widget": {
                "type": "object",
                "properties": {"status": status}
            }
        }
    })
}

fn compare(lhs: &Value, rhs: &Value, disabled: &[&str]) -> rest_api_diff_analyzer::DiffReport {
    let dir = TempDir::new().unwrap();
    let lhs_path = write(&dir, "lhs.json", lhs);
    let rhs_path = write(&dir, "rhs.json", rhs);
    ApiDiff::new(vec![lhs_path], vec![rhs_path])
        .disable_rules(disabled.iter().map(|name| name.to_string()).collect())
        .run()
        .expect("Comparison failed")
}

#[test]
fn test_self_diff_has_no_differences() {
    let doc = widget_api(json!({"type": "string", "description": "Current state"}));
    let report = compare(&doc, &doc, &[]);
    assert!(report.classification.is_empty());
    assert_eq!(report.classification.dropped, 0);
    assert!(!report.has_issues());
}

#[test]
fn test_type_omission_is_tolerated() {
    let lhs = widget_api(json!({"type": "string", "description": "Current state"}));
    let rhs = widget_api(json!({"description": "Current state"}));
    let report = compare(&lhs, &rhs, &[]);

    assert_eq!(report.summary.flagged_count, 0);
    assert_eq!(report.summary.assumed_count, 0);
    let results: Vec<_> = report.classification.no_violations().collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rule.as_deref(), Some("ignore-type-omission"));
}

#[test]
fn test_type_omission_flagged_when_rule_disabled() {
    let lhs = widget_api(json!({"type": "string", "description": "Current state"}));
    let rhs = widget_api(json!({"description": "Current state"}));
    let report = compare(&lhs, &rhs, &["ignore-type-omission"]);

    let flagged: Vec<_> = report.classification.flagged().collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].rule.as_deref(), Some("flag-type-differences"));
    assert_eq!(
        flagged[0].message.as_deref(),
        Some("Type changed from 'string' to 'undefined'.")
    );
    assert_eq!(
        flagged[0].difference.dotted(),
        "paths./widgets/{widgetname}.get.responses.200.schema.properties.status.type"
    );
}

#[test]
fn test_description_wins_over_stricter_rules() {
    // "required" and "parameters" are both on the path, but the last key decides
    let lhs = json!({"paths": {"/a": {"put": {"parameters": [
        {"name": "body", "in": "body", "required": true, "schema": {"description": "old"}}
    ]}}}});
    let rhs = json!({"paths": {"/a": {"put": {"parameters": [
        {"name": "body", "in": "body", "required": true, "schema": {"description": "new"}}
    ]}}}});
    let classification = DiffEngine::default().classify(&lhs, &rhs);
    assert_eq!(classification.len(), 1);
    assert_eq!(classification.results[0].verdict, Verdict::NoViolation);
    assert_eq!(classification.results[0].rule.as_deref(), Some("ignore-description"));
}

fn operation_with_parameter(required: Option<bool>) -> Value {
    let mut parameter = json!({"name": "filter", "in": "query", "type": "string"});
    if let Some(required) = required {
        parameter["required"] = json!(required);
    }
    json!({"paths": {"/a": {"get": {"parameters": [parameter]}}}})
}

fn operation_with_required_response(required: Option<Value>) -> Value {
    let mut schema = json!({"type": "object", "properties": {"id": {"type": "string"}}});
    if let Some(required) = required {
        schema["required"] = required;
    }
    json!({"paths": {"/a": {"get": {"responses": {"200": {"description": "OK", "schema": schema}}}}}})
}

#[test]
fn test_required_field_asymmetry() {
    let engine = DiffEngine::default();
    let verdict = |lhs: &Value, rhs: &Value| {
        let classification = engine.classify(lhs, rhs);
        assert_eq!(classification.len(), 1, "{:?}", classification.results);
        classification.results[0].verdict
    };

    let optional = operation_with_parameter(None);
    let required = operation_with_parameter(Some(true));
    assert_eq!(verdict(&optional, &required), Verdict::FlaggedViolation);
    assert_eq!(verdict(&required, &optional), Verdict::NoViolation);

    let loose = operation_with_required_response(None);
    let strict = operation_with_required_response(Some(json!(["id"])));
    assert_eq!(verdict(&loose, &strict), Verdict::NoViolation);
    assert_eq!(verdict(&strict, &loose), Verdict::FlaggedViolation);
}

#[test]
fn test_required_flag_edit_is_flagged() {
    // optional -> required and back are decided by direction; an edit of the
    // boolean falls through to the generic required rule
    let engine = DiffEngine::default();
    let required = operation_with_parameter(Some(true));
    let optional = operation_with_parameter(Some(false));

    for (lhs, rhs) in [(&required, &optional), (&optional, &required)] {
        let classification = engine.classify(lhs, rhs);
        assert_eq!(classification.len(), 1, "{:?}", classification.results);
        let result = &classification.results[0];
        assert_eq!(result.verdict, Verdict::FlaggedViolation);
        assert_eq!(result.rule.as_deref(), Some("x-required-changed"));
    }
}

#[test]
fn test_long_running_headers_tolerated() {
    let lhs = json!({"paths": {"/a": {"put": {"responses": {"202": {"description": "Accepted"}}}}}});
    let rhs = json!({"paths": {"/a": {"put": {"responses": {"202": {
        "description": "Accepted",
        "headers": {"Location": {"type": "string"}, "Retry-After": {"type": "integer"}}
    }}}}}});
    let classification = DiffEngine::default().classify(&lhs, &rhs);
    assert_eq!(classification.len(), 1);
    assert_eq!(classification.results[0].verdict, Verdict::NoViolation);
    assert_eq!(
        classification.results[0].rule.as_deref(),
        Some("ignore-long-running-headers")
    );
}

#[test]
fn test_suppression_propagates_from_definition() {
    let lhs = widget_api(json!({"type": "string"}));
    let rhs = widget_api(json!({"type": "string", "enum": ["on", "off"]}));
    let dir = TempDir::new().unwrap();
    let lhs_path = write(&dir, "lhs.json", &lhs);
    let rhs_path = write(&dir, "rhs.json", &rhs);
    let suppressions = dir.path().join("suppressions.yaml");
    fs::write(
        &suppressions,
        "- path: definitions.Widget.properties.status\n  reason: enum documented separately\n",
    )
    .unwrap();

    let report = ApiDiff::new(vec![lhs_path.clone()], vec![rhs_path.clone()])
        .suppressions(Some(suppressions))
        .run()
        .unwrap();
    assert_eq!(report.summary.flagged_count, 0);
    assert_eq!(report.summary.suppressed_count, 1);
    let suppressed: Vec<_> = report.classification.suppressed().collect();
    assert_eq!(suppressed[0].rule.as_deref(), Some("x-enum-added"));
    assert_eq!(suppressed[0].suppressed.as_deref(), Some("enum documented separately"));

    let unsuppressed = ApiDiff::new(vec![lhs_path], vec![rhs_path]).run().unwrap();
    assert_eq!(unsuppressed.summary.flagged_count, 1);
}

#[test]
fn test_suppression_list_from_yaml() {
    let list = SuppressionList::from_yaml_str("- path: Paths./A\n  reason: r\n").unwrap();
    assert!(list.find("paths./a.get.responses").is_some());
}

mockall::mock! {
    Recording {}
    impl Rule for Recording {
        fn name(&self) -> &'static str;
        fn positional(&self) -> bool;
        fn evaluate(&self, difference: &Difference, lhs: &Value, rhs: &Value) -> RuleOutcome;
    }
}

#[test]
fn test_custom_chain_precedence() {
    let mut exempt = MockRecording::new();
    exempt.expect_name().return_const("exempt-x-flag");
    exempt.expect_positional().return_const(false);
    exempt
        .expect_evaluate()
        .returning(|difference, _, _| match difference.last_key() {
            Some("x-flag") => RuleOutcome::no_violation(),
            _ => RuleOutcome::Continue,
        });

    let mut flag_all = MockRecording::new();
    flag_all.expect_name().return_const("flag-everything");
    flag_all.expect_positional().return_const(false);
    flag_all
        .expect_evaluate()
        .times(1)
        .returning(|_, _, _| RuleOutcome::flagged_with("changed"));

    let engine = DiffEngine::new(RuleChain::new(vec![Box::new(exempt), Box::new(flag_all)]));
    let lhs = json!({"x-flag": 1, "x-other": 1});
    let rhs = json!({"x-flag": 2, "x-other": 2});
    let classification = engine.classify(&lhs, &rhs);

    assert_eq!(classification.results[0].verdict, Verdict::NoViolation);
    assert_eq!(classification.results[0].rule.as_deref(), Some("exempt-x-flag"));
    assert_eq!(classification.results[1].verdict, Verdict::FlaggedViolation);
    assert_eq!(classification.results[1].message.as_deref(), Some("changed"));
}
