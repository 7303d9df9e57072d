use super::coerce::{coerce_type, is_null};
use super::content_types::{ContentHandlerKind, ContentHandlerRegistry};
use super::error::ValidationError;
use crate::server::{mime_essence, parse_query_params, ParsedRequest};
use crate::spec::RequestBodyMeta;
use crate::validator_cache::ValidatorCache;
use jsonschema::Validator;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Validates a request body against the operation's `consumes` list and body
/// schema.
///
/// The body is classified by the content handler registry. JSON and form
/// bodies that pass are stored on [`ParsedRequest::body_data`] so handlers
/// see the coerced values.
#[derive(Clone)]
pub struct RequestBodyValidator {
    body: RequestBodyMeta,
    consumes: Vec<String>,
    validator: Arc<Validator>,
    strict_validation: bool,
    registry: Arc<ContentHandlerRegistry>,
}

impl RequestBodyValidator {
    pub fn new(
        operation_id: &str,
        body: &RequestBodyMeta,
        consumes: &[String],
        strict_validation: bool,
        registry: Arc<ContentHandlerRegistry>,
        cache: &ValidatorCache,
    ) -> anyhow::Result<Self> {
        let validator = cache.get_or_compile(operation_id, "body", &body.schema)?;
        Ok(Self {
            body: body.clone(),
            consumes: consumes.to_vec(),
            validator,
            strict_validation,
            registry,
        })
    }

    pub fn validate(&self, request: &mut ParsedRequest) -> Result<(), ValidationError> {
        let Some(content_type) = request.content_type.clone() else {
            if request.is_body_empty() && !self.body.required {
                debug!(url = %request.url, "No content type and no body, skipping body validation");
                return Ok(());
            }
            return Err(self.content_type_mismatch("none"));
        };

        let essence = mime_essence(&content_type);
        let handler = self.registry.lookup(&content_type);
        let exact_match = self.consumes.iter().any(|c| mime_essence(c) == essence);
        let partial_match = handler
            .map(|h| self.consumes.iter().any(|c| mime_essence(c) == h.name))
            .unwrap_or(false);
        if !(exact_match || partial_match) {
            return Err(self.content_type_mismatch(&content_type));
        }

        let Some(handler) = handler else {
            debug!(url = %request.url, content_type = %content_type, "No handler for content type");
            return Ok(());
        };

        match &handler.kind {
            ContentHandlerKind::Streaming => Ok(()),
            ContentHandlerKind::Json => self.validate_json(request),
            ContentHandlerKind::FormUrlEncoded | ContentHandlerKind::MultipartFormData => {
                self.validate_form(request)
            }
            ContentHandlerKind::Custom(deserializer) => {
                let data = deserializer
                    .deserialize(request)
                    .map_err(|message| ValidationError::Schema { message })?;
                self.check_schema(&data, &request.url)?;
                request.body_data = Some(data);
                Ok(())
            }
        }
    }

    /// Validate `data` against the body schema. A null-equivalent value is
    /// accepted when the body is nullable.
    pub fn validate_schema(&self, data: &Value, url: &str) -> Result<(), ValidationError> {
        if self.body.nullable && is_null(data) {
            return Ok(());
        }
        self.validator.validate(data).map_err(|e| {
            error!(url = %url, validator = "body", error = %e, "Request body validation error");
            ValidationError::schema(e.to_string())
        })
    }

    /// [`Self::validate_schema`], with failures ignored when the schema
    /// declares a `default`.
    fn check_schema(&self, data: &Value, url: &str) -> Result<(), ValidationError> {
        match self.validate_schema(data, url) {
            Err(e) if self.body.has_default() => {
                debug!(url = %url, error = %e, "Body schema has a default, failure ignored");
                Ok(())
            }
            other => other,
        }
    }

    fn validate_json(&self, request: &mut ParsedRequest) -> Result<(), ValidationError> {
        let data = if request.is_body_empty() {
            if !self.body.required {
                return Ok(());
            }
            Value::Null
        } else {
            match request.json() {
                Some(v) => v.clone(),
                None if self.body.nullable => Value::Null,
                None => return Err(ValidationError::MalformedBody),
            }
        };
        debug!(url = %request.url, "Validating JSON body");
        self.check_schema(&data, &request.url)?;
        request.body_data = Some(data);
        Ok(())
    }

    fn validate_form(&self, request: &mut ParsedRequest) -> Result<(), ValidationError> {
        let fields = if request.form.is_empty() && !request.body.is_empty() {
            parse_query_params(&String::from_utf8_lossy(&request.body))
        } else {
            request.form.clone()
        };
        let mut data: Map<String, Value> = fields
            .keys()
            .into_iter()
            .filter_map(|k| fields.get(k).map(|v| (k.to_string(), v.to_json())))
            .collect();
        for name in request.files.keys() {
            data.insert(name.clone(), Value::String(String::new()));
        }

        let properties = self.body.schema.get("properties").and_then(Value::as_object);

        if self.strict_validation {
            let extras: Vec<String> = fields
                .keys()
                .into_iter()
                .filter(|k| !properties.is_some_and(|p| p.contains_key(*k)))
                .map(str::to_string)
                .collect();
            if !extras.is_empty() {
                return Err(ValidationError::ExtraParameters {
                    query: Vec::new(),
                    form: extras,
                });
            }
        }

        if let Some(properties) = properties {
            for (name, prop_schema) in properties {
                if let Some(raw) = data.get(name) {
                    let cast = coerce_type(prop_schema, raw, "requestBody", name)?;
                    data.insert(name.clone(), cast);
                }
            }
        }

        debug!(url = %request.url, fields = data.len(), "Validating form body");
        let data = Value::Object(data);
        self.check_schema(&data, &request.url)?;
        request.body_data = Some(data);
        Ok(())
    }

    fn content_type_mismatch(&self, content_type: &str) -> ValidationError {
        ValidationError::ContentTypeMismatch {
            content_type: content_type.to_string(),
            consumes: self.consumes.clone(),
        }
    }
}

/// Validates handler output against a declared response schema.
#[derive(Clone)]
pub struct ResponseBodyValidator {
    validator: Arc<Validator>,
}

impl ResponseBodyValidator {
    pub fn new(operation_id: &str, status: &str, schema: &Value, cache: &ValidatorCache) -> anyhow::Result<Self> {
        let validator = cache.get_or_compile(operation_id, &format!("response:{status}"), schema)?;
        Ok(Self { validator })
    }

    /// Returns the validator message on mismatch.
    pub fn validate_schema(&self, data: &Value, url: &str) -> Result<(), String> {
        self.validator.validate(data).map_err(|e| {
            error!(url = %url, validator = "response", error = %e, "Response body validation error");
            e.to_string()
        })
    }
}
