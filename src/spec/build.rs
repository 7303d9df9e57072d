use super::types::{
    schema_is_nullable, CollectionFormat, OperationMeta, ParameterLocation, ParameterMeta,
    RequestBodyMeta, ResponseSpec, Responses,
};
use http::Method;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Longest chain of `$ref`-to-`$ref` hops followed when dereferencing a
/// parameter or response object.
const MAX_REF_DEPTH: usize = 32;

/// Keys of a Swagger 2 parameter object that are not JSON Schema keywords.
const SWAGGER2_PARAM_KEYS: [&str; 6] = [
    "name",
    "in",
    "required",
    "description",
    "collectionFormat",
    "allowEmptyValue",
];

/// Problem found while building operations from a document.
#[derive(Debug, Clone)]
pub struct SpecIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl SpecIssue {
    pub fn new(location: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        SpecIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Resolve a local JSON reference such as `#/definitions/Pet` or
/// `#/components/schemas/Pet` against the document root.
pub fn resolve_ref<'a>(doc: &'a Value, ref_path: &str) -> Option<&'a Value> {
    let pointer = ref_path.strip_prefix('#')?;
    doc.pointer(pointer)
}

/// Follow a top-level `$ref` (if any) and return the referenced object.
fn deref<'a>(doc: &'a Value, value: &'a Value) -> &'a Value {
    let mut current = value;
    for _ in 0..MAX_REF_DEPTH {
        match current.get("$ref").and_then(Value::as_str) {
            Some(r) => match resolve_ref(doc, r) {
                Some(target) => current = target,
                None => return current,
            },
            None => return current,
        }
    }
    current
}

/// Replace local `$ref` objects with their targets.
///
/// A `$ref` back into a definition that is already being expanded stays a
/// `$ref`. Its target is embedded in `value` under the same JSON pointer
/// (`definitions/Node`, `components/schemas/Node`) so the schema still
/// resolves once compiled on its own.
pub fn expand_schema_refs(doc: &Value, value: &mut Value) {
    let mut recursive = BTreeSet::new();
    expand_refs_in_chain(doc, value, &mut Vec::new(), &mut recursive);

    let mut embedded = BTreeSet::new();
    loop {
        let Some(ref_path) = recursive.iter().find(|r| !embedded.contains(*r)).cloned() else {
            break;
        };
        embedded.insert(ref_path.clone());
        let Some(target) = resolve_ref(doc, &ref_path) else {
            continue;
        };
        let mut target = target.clone();
        expand_refs_in_chain(doc, &mut target, &mut vec![ref_path.clone()], &mut recursive);
        embed_at_pointer(value, &ref_path, target);
    }
}

fn expand_refs_in_chain(
    doc: &Value,
    value: &mut Value,
    chain: &mut Vec<String>,
    recursive: &mut BTreeSet<String>,
) {
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(Value::as_str).map(str::to_string) {
                if chain.contains(&ref_path) {
                    debug!(reference = %ref_path, "Keeping recursive $ref");
                    recursive.insert(ref_path);
                    return;
                }
                if let Some(target) = resolve_ref(doc, &ref_path) {
                    let mut new_val = target.clone();
                    chain.push(ref_path);
                    expand_refs_in_chain(doc, &mut new_val, chain, recursive);
                    chain.pop();
                    *value = new_val;
                    return;
                }
            }
            for v in obj.values_mut() {
                expand_refs_in_chain(doc, v, chain, recursive);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_refs_in_chain(doc, v, chain, recursive);
            }
        }
        _ => {}
    }
}

/// Place `target` in `root` at the location named by the local reference,
/// creating intermediate objects. An existing entry is left as is.
fn embed_at_pointer(root: &mut Value, ref_path: &str, target: Value) {
    let Some(pointer) = ref_path.strip_prefix("#/") else {
        return;
    };
    let segments: Vec<String> = pointer
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        let Some(obj) = current.as_object_mut() else {
            warn!(reference = %ref_path, "Cannot embed recursive schema, path is not an object");
            return;
        };
        current = obj.entry(segment.clone()).or_insert_with(|| json!({}));
    }
    match current.as_object_mut() {
        Some(obj) => {
            obj.entry(last.clone()).or_insert(target);
        }
        None => warn!(reference = %ref_path, "Cannot embed recursive schema, path is not an object"),
    }
}

fn expanded(doc: &Value, value: &Value) -> Value {
    let mut v = value.clone();
    expand_schema_refs(doc, &mut v);
    v
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// True for Swagger 2.0 documents, false for OpenAPI 3.x.
pub fn is_swagger2(doc: &Value) -> bool {
    doc.get("swagger").is_some()
}

fn resolve_operation_id(
    operation: &Value,
    location: &str,
    issues: &mut Vec<SpecIssue>,
) -> Option<String> {
    operation
        .as_object()
        .and_then(|obj| {
            obj.iter().find_map(|(key, val)| {
                if key.starts_with("x-handler") {
                    val.as_str().map(str::to_string)
                } else {
                    None
                }
            })
        })
        .or_else(|| {
            operation
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| {
            issues.push(SpecIssue::new(
                location,
                "MissingOperationId",
                "Missing operationId or x-handler-* extension",
            ));
            None
        })
}

/// Path-level parameters overridden by operation-level ones with the same
/// `(name, in)` pair.
fn merge_parameters<'a>(doc: &'a Value, path_item: &'a Value, operation: &'a Value) -> Vec<&'a Value> {
    let mut merged: Vec<&Value> = Vec::new();
    let sources = [path_item.get("parameters"), operation.get("parameters")];
    for params in sources.into_iter().flatten().filter_map(Value::as_array) {
        for p in params {
            let p = deref(doc, p);
            let key = (p.get("name"), p.get("in"));
            merged.retain(|existing| (existing.get("name"), existing.get("in")) != key);
            merged.push(p);
        }
    }
    merged
}

fn swagger2_parameter(doc: &Value, param: &Value, location: ParameterLocation) -> Option<ParameterMeta> {
    let obj = param.as_object()?;
    let name = obj.get("name")?.as_str()?;
    let mut schema = Value::Object(
        obj.iter()
            .filter(|(k, _)| !SWAGGER2_PARAM_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    expand_schema_refs(doc, &mut schema);
    let format = obj
        .get("collectionFormat")
        .and_then(Value::as_str)
        .map(CollectionFormat::parse)
        .unwrap_or_default();
    let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);
    Some(
        ParameterMeta::new(name, location, schema)
            .required(required)
            .with_collection_format(format),
    )
}

fn openapi3_parameter(doc: &Value, param: &Value, location: ParameterLocation) -> Option<ParameterMeta> {
    let name = param.get("name")?.as_str()?;
    let schema = param
        .get("schema")
        .map(|s| expanded(doc, s))
        .unwrap_or_else(|| json!({}));
    let nullable = schema_is_nullable(&schema)
        || param.get("x-nullable").and_then(Value::as_bool).unwrap_or(false);
    let format = CollectionFormat::from_style(
        param.get("style").and_then(Value::as_str),
        param.get("explode").and_then(Value::as_bool),
        location,
    );
    let required = param
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(location == ParameterLocation::Path);
    Some(
        ParameterMeta::new(name, location, schema)
            .required(required)
            .with_collection_format(format)
            .nullable(nullable),
    )
}

/// Swagger 2 has no body schema for form operations; derive one from the
/// `formData` parameters so the form content handler can coerce and validate.
fn form_body_from_parameters(params: &[ParameterMeta]) -> Option<RequestBodyMeta> {
    let form: Vec<&ParameterMeta> = params
        .iter()
        .filter(|p| p.location == ParameterLocation::FormData)
        .collect();
    if form.is_empty() {
        return None;
    }
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in &form {
        let prop = if p.is_file() {
            json!({"type": "string", "format": "binary"})
        } else {
            p.schema.clone()
        };
        properties.insert(p.name.clone(), prop);
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    // draft 4 rejects an empty `required` array
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Some(RequestBodyMeta::new(Value::Object(schema)))
}

fn swagger2_responses(doc: &Value, operation: &Value) -> Responses {
    let mut out = Responses::new();
    if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
        for (status, resp) in responses {
            let resp = deref(doc, resp);
            let schema = resp.get("schema").map(|s| expanded(doc, s));
            let required_headers = resp
                .get("headers")
                .and_then(Value::as_object)
                .map(|h| h.keys().cloned().collect())
                .unwrap_or_default();
            out.insert(
                status.clone(),
                ResponseSpec {
                    schema,
                    required_headers,
                },
            );
        }
    }
    out
}

fn is_json_like(media_type: &str) -> bool {
    crate::validator::is_json_mimetype(media_type)
}

/// Pick the schema of the most useful media type: JSON first, then the first
/// entry that declares one.
fn content_schema(doc: &Value, content: &Map<String, Value>) -> Option<Value> {
    content
        .iter()
        .find(|(mt, media)| is_json_like(mt) && media.get("schema").is_some())
        .or_else(|| content.iter().find(|(_, media)| media.get("schema").is_some()))
        .and_then(|(_, media)| media.get("schema"))
        .map(|s| expanded(doc, s))
}

fn openapi3_responses(doc: &Value, operation: &Value, produces: &mut Vec<String>) -> Responses {
    let mut out = Responses::new();
    if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
        for (status, resp) in responses {
            let resp = deref(doc, resp);
            let content = resp.get("content").and_then(Value::as_object);
            if let Some(content) = content {
                for mt in content.keys() {
                    if !produces.contains(mt) {
                        produces.push(mt.clone());
                    }
                }
            }
            let schema = content.and_then(|c| content_schema(doc, c));
            let required_headers = resp
                .get("headers")
                .and_then(Value::as_object)
                .map(|headers| {
                    headers
                        .iter()
                        .filter(|(_, h)| {
                            deref(doc, h)
                                .get("required")
                                .and_then(Value::as_bool)
                                .unwrap_or(false)
                        })
                        .map(|(name, _)| name.clone())
                        .collect()
                })
                .unwrap_or_default();
            out.insert(
                status.clone(),
                ResponseSpec {
                    schema,
                    required_headers,
                },
            );
        }
    }
    out
}

fn build_swagger2_operation(
    doc: &Value,
    mut meta: OperationMeta,
    params: &[&Value],
    operation: &Value,
    location: &str,
    issues: &mut Vec<SpecIssue>,
) -> OperationMeta {
    for p in params {
        let loc_str = p.get("in").and_then(Value::as_str).unwrap_or_default();
        if loc_str == "body" {
            let schema = p.get("schema").map(|s| expanded(doc, s)).unwrap_or_else(|| json!({}));
            let required = p.get("required").and_then(Value::as_bool).unwrap_or(false);
            let mut body = RequestBodyMeta::new(schema).required(required);
            body.nullable |= p.get("x-nullable").and_then(Value::as_bool).unwrap_or(false);
            meta.body = Some(body);
            continue;
        }
        match ParameterLocation::parse(loc_str).and_then(|loc| swagger2_parameter(doc, p, loc)) {
            Some(param) => meta.parameters.push(param),
            None => {
                debug!(location = %location, parameter_in = %loc_str, "Skipping unsupported parameter");
                if p.get("name").is_none() {
                    issues.push(SpecIssue::new(location, "InvalidParameter", "Parameter without a name"));
                }
            }
        }
    }

    if let Some(consumes) = string_list(operation.get("consumes")).or_else(|| string_list(doc.get("consumes"))) {
        meta.consumes = consumes;
    }
    if let Some(produces) = string_list(operation.get("produces")).or_else(|| string_list(doc.get("produces"))) {
        meta.produces = produces;
    }
    if meta.body.is_none() {
        meta.body = form_body_from_parameters(&meta.parameters);
    }
    meta.responses = swagger2_responses(doc, operation);
    meta
}

fn build_openapi3_operation(
    doc: &Value,
    mut meta: OperationMeta,
    params: &[&Value],
    operation: &Value,
    location: &str,
) -> OperationMeta {
    for p in params {
        let loc_str = p.get("in").and_then(Value::as_str).unwrap_or_default();
        match ParameterLocation::parse(loc_str).and_then(|loc| openapi3_parameter(doc, p, loc)) {
            Some(param) => meta.parameters.push(param),
            None => debug!(location = %location, parameter_in = %loc_str, "Skipping unsupported parameter"),
        }
    }

    if let Some(request_body) = operation.get("requestBody").map(|rb| deref(doc, rb)) {
        if let Some(content) = request_body.get("content").and_then(Value::as_object) {
            meta.consumes = content.keys().cloned().collect();
            if let Some(schema) = content_schema(doc, content) {
                let required = request_body
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                meta.body = Some(RequestBodyMeta::new(schema).required(required));
            }
        }
    }

    let mut produces = Vec::new();
    meta.responses = openapi3_responses(doc, operation, &mut produces);
    if !produces.is_empty() {
        meta.produces = produces;
    }
    meta
}

/// Build operation metadata for every operation of a Swagger 2 or OpenAPI 3
/// document.
///
/// # Errors
///
/// Returns an error listing every issue found (missing operation ids, nameless
/// parameters) when the document cannot be turned into operations.
pub fn build_operations(doc: &Value) -> anyhow::Result<Vec<OperationMeta>> {
    let mut operations = Vec::new();
    let mut issues = Vec::new();
    let swagger2 = is_swagger2(doc);

    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return Ok(operations);
    };

    for (path, item) in paths {
        let item = deref(doc, item);
        for method_str in METHODS {
            let Some(operation) = item.get(method_str) else {
                continue;
            };
            let location = format!("{} {}", method_str.to_ascii_uppercase(), path);
            let method = match Method::from_bytes(method_str.to_ascii_uppercase().as_bytes()) {
                Ok(m) => m,
                Err(e) => {
                    issues.push(SpecIssue::new(&location, "InvalidMethod", e.to_string()));
                    continue;
                }
            };
            let Some(operation_id) = resolve_operation_id(operation, &location, &mut issues) else {
                continue;
            };

            let params = merge_parameters(doc, item, operation);
            let meta = OperationMeta::new(operation_id, method, path.clone());
            let meta = if swagger2 {
                build_swagger2_operation(doc, meta, &params, operation, &location, &mut issues)
            } else {
                build_openapi3_operation(doc, meta, &params, operation, &location)
            };
            debug!(
                operation_id = %meta.operation_id,
                location = %location,
                parameters = meta.parameters.len(),
                has_body = meta.body.is_some(),
                "Operation built"
            );
            operations.push(meta);
        }
    }

    if !issues.is_empty() {
        for issue in &issues {
            warn!(issue = %issue, "Specification issue");
        }
        let listing = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!(
            "specification validation failed, {} issue(s) found:\n{}",
            issues.len(),
            listing
        );
    }
    Ok(operations)
}
