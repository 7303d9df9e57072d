use super::body::ResponseBodyValidator;
use super::error::NonConformingResponse;
use crate::server::{is_json_mimetype, ApiResponse};
use crate::spec::OperationMeta;
use crate::validator_cache::ValidatorCache;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone)]
struct CompiledResponse {
    body: Option<ResponseBodyValidator>,
    required_headers: Vec<String>,
}

/// Checks handler output against the operation's declared responses.
///
/// The declaration for the exact status is used, falling back to `default`.
/// Undeclared statuses pass. Only JSON bodies are schema-checked.
#[derive(Clone)]
pub struct ResponseValidator {
    mimetype: String,
    responses: HashMap<String, CompiledResponse>,
}

impl ResponseValidator {
    pub fn new(meta: &OperationMeta, mimetype: &str, cache: &ValidatorCache) -> anyhow::Result<Self> {
        let mut responses = HashMap::with_capacity(meta.responses.len());
        for (status, spec) in &meta.responses {
            let body = match &spec.schema {
                Some(schema) => Some(ResponseBodyValidator::new(&meta.operation_id, status, schema, cache)?),
                None => None,
            };
            responses.insert(
                status.clone(),
                CompiledResponse {
                    body,
                    required_headers: spec.required_headers.clone(),
                },
            );
        }
        Ok(Self {
            mimetype: mimetype.to_string(),
            responses,
        })
    }

    pub fn validate(&self, response: &ApiResponse, url: &str) -> Result<(), NonConformingResponse> {
        let status = response.status;
        let Some(declared) = self
            .responses
            .get(status.to_string().as_str())
            .or_else(|| self.responses.get("default"))
        else {
            debug!(url = %url, status = status, "No declared response for status");
            return Ok(());
        };

        let mimetype = response.mimetype.as_deref().unwrap_or(&self.mimetype);
        if let Some(body) = &declared.body {
            if is_json_mimetype(mimetype) {
                let data = response.json().unwrap_or(Value::Null);
                body.validate_schema(&data, url)
                    .map_err(|message| NonConformingResponse::Body { status, message })?;
            }
        }

        let missing: Vec<String> = declared
            .required_headers
            .iter()
            .filter(|h| response.get_header(h).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(NonConformingResponse::Headers { status, missing });
        }
        Ok(())
    }
}
