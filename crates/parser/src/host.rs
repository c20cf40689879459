//! Path and host normalization
//!
//! Runs per root document after references are resolved: merges `x-ms-paths`,
//! pushes document-level defaults into every operation, and canonicalizes
//! parameter naming and ordering.

use rest_api_diff_common::{DiffError, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

/// Operation keys of a Swagger path item
pub const OPERATION_VERBS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Synthetic operation key holding the rendered host
pub const HOST_KEY: &str = "__host";

/// Fixed name given to every body parameter
pub const BODY_PARAMETER_NAME: &str = "_body_";

const PARAMETERIZED_HOST_KEY: &str = "x-ms-parameterized-host";
const VENDOR_PATHS_KEY: &str = "x-ms-paths";

/// Strip every non-alphanumeric character and lower-case the rest
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Rewrite every `{placeholder}` in a path template through [`normalize_name`]
pub fn normalize_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push('{');
        out.push_str(&normalize_name(&rest[open + 1..open + close]));
        out.push('}');
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostPosition {
    First,
    Last,
}

/// Parsed `x-ms-parameterized-host` block
#[derive(Debug, Clone)]
struct ParameterizedHost {
    rendered: String,
    position: HostPosition,
    parameters: Vec<Value>,
}

impl ParameterizedHost {
    fn from_value(value: &Value) -> Option<Self> {
        let template = value.get("hostTemplate")?.as_str()?;
        let prefix = if value.get("useSchemePrefix").and_then(Value::as_bool) == Some(true) {
            "https://"
        } else {
            ""
        };
        let position = match value.get("positionInOperation").and_then(Value::as_str) {
            Some("first") => HostPosition::First,
            _ => HostPosition::Last,
        };
        let parameters = value
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Some(Self {
            rendered: normalize_template(&format!("{prefix}{template}")),
            position,
            parameters,
        })
    }
}

/// Document-level settings pushed into every operation
#[derive(Debug, Clone, Default)]
struct OperationDefaults {
    host: Option<String>,
    host_position: Option<HostPosition>,
    host_parameters: Vec<Value>,
    consumes: Option<Value>,
    produces: Option<Value>,
}

/// Normalize one resolved root document
pub fn normalize_document(document: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut root = document;
    let paths = merge_vendor_paths(&mut root);

    let mut defaults = OperationDefaults {
        consumes: root.remove("consumes"),
        produces: root.remove("produces"),
        ..OperationDefaults::default()
    };
    let plain_host = root.remove("host").and_then(|h| h.as_str().map(str::to_string));
    match root.remove(PARAMETERIZED_HOST_KEY).as_ref().and_then(ParameterizedHost::from_value) {
        Some(host) => {
            debug!(host = %host.rendered, "applying parameterized host");
            defaults.host = Some(host.rendered);
            defaults.host_position = Some(host.position);
            defaults.host_parameters = host.parameters;
        }
        None => defaults.host = plain_host,
    }

    let mut normalized = Map::new();
    for (template, item) in paths {
        let key = normalize_template(&template);
        if normalized.contains_key(&key) {
            return Err(DiffError::DuplicatePath { path: key });
        }
        normalized.insert(key, normalize_path_item(item, &defaults));
    }
    root.insert("paths".to_string(), Value::Object(normalized));
    Ok(root)
}

/// Union `x-ms-paths` into `paths`; vendor entries win on collision
fn merge_vendor_paths(root: &mut Map<String, Value>) -> Map<String, Value> {
    let mut paths = match root.remove("paths") {
        Some(Value::Object(paths)) => paths,
        _ => Map::new(),
    };
    if let Some(Value::Object(vendor)) = root.remove(VENDOR_PATHS_KEY) {
        for (template, item) in vendor {
            paths.insert(template, item);
        }
    }
    paths
}

fn normalize_path_item(item: Value, defaults: &OperationDefaults) -> Value {
    let Value::Object(mut item) = item else {
        return item;
    };
    let shared = match item.remove("parameters") {
        Some(Value::Array(parameters)) => parameters,
        _ => Vec::new(),
    };
    let mut out = Map::new();
    for (key, value) in item {
        if OPERATION_VERBS.contains(&key.as_str()) {
            out.insert(key, normalize_operation(value, &shared, defaults));
        } else {
            out.insert(key, value);
        }
    }
    Value::Object(out)
}

fn normalize_operation(operation: Value, shared: &[Value], defaults: &OperationDefaults) -> Value {
    let Value::Object(mut operation) = operation else {
        return operation;
    };

    let own = match operation.remove("parameters") {
        Some(Value::Array(parameters)) => parameters,
        _ => Vec::new(),
    };
    let mut parameters: Vec<Value> = shared
        .iter()
        .filter(|candidate| !own.iter().any(|p| same_parameter(p, candidate)))
        .cloned()
        .collect();
    parameters.extend(own);

    match defaults.host_position {
        Some(HostPosition::First) => {
            let mut with_host = defaults.host_parameters.clone();
            with_host.extend(parameters);
            parameters = with_host;
        }
        Some(HostPosition::Last) => parameters.extend(defaults.host_parameters.iter().cloned()),
        None => {}
    }

    let mut parameters: Vec<Value> = parameters.into_iter().map(normalize_parameter).collect();
    parameters.sort_by(compare_parameters);
    if !parameters.is_empty() {
        operation.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(consumes) = &defaults.consumes {
        operation
            .entry("consumes")
            .or_insert_with(|| consumes.clone());
    }
    if let Some(produces) = &defaults.produces {
        operation
            .entry("produces")
            .or_insert_with(|| produces.clone());
    }
    if let Some(host) = &defaults.host {
        operation.insert(HOST_KEY.to_string(), Value::String(host.clone()));
    }
    Value::Object(operation)
}

fn same_parameter(a: &Value, b: &Value) -> bool {
    a.get("name") == b.get("name") && a.get("in") == b.get("in")
}

fn normalize_parameter(parameter: Value) -> Value {
    let Value::Object(mut parameter) = parameter else {
        return parameter;
    };
    let location = parameter.get("in").and_then(Value::as_str).map(str::to_string);
    match location.as_deref() {
        Some("body") => {
            parameter.insert(
                "name".to_string(),
                Value::String(BODY_PARAMETER_NAME.to_string()),
            );
        }
        Some("path") => {
            if let Some(name) = parameter.get("name").and_then(Value::as_str) {
                let normalized = normalize_name(name);
                parameter.insert("name".to_string(), Value::String(normalized));
            }
        }
        _ => {}
    }
    Value::Object(parameter)
}

/// Total order over parameters: name, then location, then serialized form
fn compare_parameters(a: &Value, b: &Value) -> Ordering {
    let key = |p: &Value| {
        (
            p.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            p.get("in").and_then(Value::as_str).unwrap_or_default().to_string(),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.to_string().as_bytes().cmp(b.to_string().as_bytes()))
}
