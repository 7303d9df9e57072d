use super::build::build_operations;
use super::types::OperationMeta;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Parse a YAML or JSON document into a JSON value.
///
/// YAML is a superset of JSON, so `serde_yaml` handles both; the extension only
/// picks the faster JSON parser when it applies.
pub fn parse_document(content: &str, json: bool) -> anyhow::Result<Value> {
    let value = if json {
        serde_json::from_str(content).context("failed to parse JSON specification")?
    } else {
        serde_yaml::from_str(content).context("failed to parse YAML specification")?
    };
    Ok(value)
}

/// Load a Swagger 2 / OpenAPI 3 document from disk and build its operations.
pub fn load_spec(file_path: impl AsRef<Path>) -> anyhow::Result<Vec<OperationMeta>> {
    let path = file_path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read specification {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let doc = parse_document(&content, is_json)?;
    build_operations(&doc).with_context(|| format!("invalid specification {}", path.display()))
}

/// Build operations from an in-memory YAML or JSON document.
pub fn load_spec_from_str(content: &str) -> anyhow::Result<Vec<OperationMeta>> {
    let doc = parse_document(content, false)?;
    build_operations(&doc)
}

/// Build operations from an already parsed document.
pub fn load_spec_from_value(doc: &Value) -> anyhow::Result<Vec<OperationMeta>> {
    build_operations(doc)
}
