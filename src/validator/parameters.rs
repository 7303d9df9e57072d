use super::coerce::{coerce_type, is_null, is_nullable};
use super::error::ValidationError;
use crate::server::ParsedRequest;
use crate::spec::{ParameterLocation, ParameterMeta};
use crate::validator_cache::ValidatorCache;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A declared parameter with its schema compiled.
///
/// File parameters carry no validator; they are only checked for presence.
#[derive(Clone)]
struct CompiledParameter {
    meta: ParameterMeta,
    validator: Option<Arc<Validator>>,
}

/// Validates the query, path, header and formData parameters of a request.
///
/// Locations are checked in that order and the first failure wins. In strict
/// mode undeclared query keys are rejected before anything else, as are
/// undeclared form keys when the operation declares formData parameters.
#[derive(Clone)]
pub struct ParameterValidator {
    parameters: Vec<CompiledParameter>,
    strict_validation: bool,
}

/// The schema a parameter value is validated against. A boolean `required`
/// belongs to the parameter object, not to JSON Schema.
fn validation_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Some(obj) = schema.as_object_mut() {
        if obj.get("required").is_some_and(Value::is_boolean) {
            obj.remove("required");
        }
    }
    schema
}

impl ParameterValidator {
    pub fn new(
        operation_id: &str,
        parameters: &[ParameterMeta],
        strict_validation: bool,
        cache: &ValidatorCache,
    ) -> anyhow::Result<Self> {
        let mut compiled = Vec::with_capacity(parameters.len());
        for meta in parameters {
            let validator = if meta.is_file() {
                None
            } else {
                let kind = format!("{}:{}", meta.location, meta.name);
                Some(cache.get_or_compile(operation_id, &kind, &validation_schema(&meta.schema))?)
            };
            compiled.push(CompiledParameter {
                meta: meta.clone(),
                validator,
            });
        }
        Ok(Self {
            parameters: compiled,
            strict_validation,
        })
    }

    pub fn strict_validation(&self) -> bool {
        self.strict_validation
    }

    /// Declared parameters, in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterMeta> {
        self.parameters.iter().map(|p| &p.meta)
    }

    pub fn validate(&self, request: &ParsedRequest) -> Result<(), ValidationError> {
        if self.strict_validation {
            self.check_extra_parameters(request)?;
        }
        for location in ParameterLocation::ORDERED {
            for param in self.parameters.iter().filter(|p| p.meta.location == location) {
                let value = fetch_value(&param.meta, request);
                Self::validate_parameter(param, value, &request.url)?;
            }
        }
        Ok(())
    }

    fn validate_parameter(
        param: &CompiledParameter,
        value: Option<Value>,
        url: &str,
    ) -> Result<(), ValidationError> {
        let meta = &param.meta;
        let Some(value) = value else {
            if meta.required {
                return Err(ValidationError::MissingParameter {
                    location: meta.location,
                    name: meta.name.clone(),
                });
            }
            return Ok(());
        };
        if is_nullable(meta) && is_null(&value) {
            return Ok(());
        }
        let Some(validator) = &param.validator else {
            return Ok(());
        };

        let converted = coerce_type(&meta.schema, &value, &meta.location.to_string(), &meta.name)?;
        validator.validate(&converted).map_err(|e| {
            info!(
                url = %url,
                location = %meta.location,
                parameter = %meta.name,
                error = %e,
                "Parameter validation error"
            );
            ValidationError::schema(e.to_string())
        })
    }

    fn check_extra_parameters(&self, request: &ParsedRequest) -> Result<(), ValidationError> {
        let declared = |location: ParameterLocation| -> Vec<&str> {
            self.parameters
                .iter()
                .filter(|p| p.meta.location == location)
                .map(|p| p.meta.name.as_str())
                .collect()
        };
        let declared_query = declared(ParameterLocation::Query);
        let declared_form = declared(ParameterLocation::FormData);

        let extra_query: Vec<String> = request
            .query
            .keys()
            .into_iter()
            .filter(|k| !declared_query.contains(k))
            .map(str::to_string)
            .collect();
        // Without formData parameters the fields live in the request body
        // schema and the body validator owns the extras check.
        let extra_form: Vec<String> = if declared_form.is_empty() {
            Vec::new()
        } else {
            request
                .form
                .keys()
                .into_iter()
                .filter(|k| !declared_form.contains(k))
                .map(str::to_string)
                .collect()
        };

        if extra_query.is_empty() && extra_form.is_empty() {
            return Ok(());
        }
        debug!(
            url = %request.url,
            extra_query = ?extra_query,
            extra_form = ?extra_form,
            "Undeclared parameters rejected"
        );
        Err(ValidationError::ExtraParameters {
            query: extra_query,
            form: extra_form,
        })
    }
}

/// Raw value of `param` in `request`, if present.
fn fetch_value(param: &ParameterMeta, request: &ParsedRequest) -> Option<Value> {
    match param.location {
        ParameterLocation::Query => request.query.get(&param.name).map(|v| v.to_json()),
        ParameterLocation::Path => {
            let normalized = param.name.replace('-', "_");
            request
                .path_params
                .get(&normalized)
                .or_else(|| request.path_params.get(&param.name))
                .map(|v| v.to_json())
        }
        ParameterLocation::Header => request.get_header(&param.name).map(|raw| {
            if param.is_array() {
                let delimiter = param.collection_format.delimiter();
                Value::Array(
                    raw.split(delimiter)
                        .map(|s| Value::String(s.trim().to_string()))
                        .collect(),
                )
            } else {
                Value::String(raw.to_string())
            }
        }),
        ParameterLocation::FormData => {
            if param.is_file() {
                request
                    .files
                    .contains_key(&param.name)
                    .then(|| Value::String(String::new()))
            } else {
                request.form.get(&param.name).map(|v| v.to_json())
            }
        }
    }
}
