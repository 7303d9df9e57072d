use super::problem::Problem;
use crate::spec::ParameterLocation;
use serde_json::{json, Value};
use thiserror::Error;

/// A raw value could not be converted to the type its schema declares.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Wrong type, expected '{expected}' for {location} parameter '{name}'")]
pub struct TypeCoercionError {
    pub value: Value,
    pub expected: String,
    pub location: String,
    pub name: String,
}

/// Request-side validation failures. Each one is answered with a [`Problem`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    TypeCoercion(#[from] TypeCoercionError),

    #[error("{message}")]
    Schema { message: String },

    #[error("Missing {location} parameter '{name}'")]
    MissingParameter {
        location: ParameterLocation,
        name: String,
    },

    #[error("Invalid Content-type ({content_type}), expected one of {consumes:?}")]
    ContentTypeMismatch {
        content_type: String,
        consumes: Vec<String>,
    },

    #[error("{}", extra_parameters_detail(.query, .form))]
    ExtraParameters { query: Vec<String>, form: Vec<String> },

    #[error("Request body is not valid JSON")]
    MalformedBody,
}

fn extra_parameters_detail(query: &[String], form: &[String]) -> String {
    if !query.is_empty() {
        format!("Extra query parameter(s) {} not in spec", query.join(", "))
    } else {
        format!("Extra formData parameter(s) {} not in spec", form.join(", "))
    }
}

impl ValidationError {
    pub fn schema(message: impl Into<String>) -> Self {
        ValidationError::Schema {
            message: message.into(),
        }
    }

    /// HTTP status answered for this failure.
    pub fn status(&self) -> u16 {
        match self {
            ValidationError::ContentTypeMismatch { .. } => 415,
            _ => 400,
        }
    }

    pub fn to_problem(&self) -> Problem {
        match self {
            ValidationError::ContentTypeMismatch { .. } => {
                Problem::unsupported_media_type(self.to_string())
            }
            ValidationError::ExtraParameters { query, form } => Problem::bad_request(self.to_string())
                .with_ext("extra_query", json!(query))
                .with_ext("extra_formData", json!(form)),
            _ => Problem::bad_request(self.to_string()),
        }
    }
}

impl From<ValidationError> for Problem {
    fn from(err: ValidationError) -> Self {
        err.to_problem()
    }
}

/// The handler produced a response that contradicts the operation's
/// declared responses. Surfaced to the caller as an `Err`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NonConformingResponse {
    #[error("Response body does not conform to specification: {message}")]
    Body { status: u16, message: String },

    #[error(
        "Response headers do not conform to specification: missing {} for status {status}",
        .missing.join(", ")
    )]
    Headers { status: u16, missing: Vec<String> },
}
