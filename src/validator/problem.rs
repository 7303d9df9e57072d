//! RFC 7807 problem details.
//!
//! Every request-side validation failure is turned into a [`Problem`] and
//! answered in place of the handler's output.

use crate::server::{dumps, ApiResponse, HeaderVec};
use serde::Serialize;
use serde_json::{Map, Value};

/// Content type of serialized problems.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// A structured, status-coded error payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Extension members, merged into the top-level object
    #[serde(flatten)]
    pub ext: Map<String, Value>,
    #[serde(skip)]
    pub headers: HeaderVec,
}

impl Problem {
    pub fn new(status: u16, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.into(),
            detail: detail.into(),
            status,
            instance: None,
            ext: Map::new(),
            headers: HeaderVec::new(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, "Bad Request", detail)
    }

    pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
        Self::new(415, "Unsupported Media Type", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, "Not Found", detail)
    }

    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_ext(mut self, key: impl Into<String>, value: Value) -> Self {
        self.ext.insert(key.into(), value);
        self
    }

    /// Serialize into an [`ApiResponse`] with `application/problem+json`.
    pub fn to_response(&self) -> ApiResponse {
        let data = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut response = ApiResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: dumps(&data),
            mimetype: Some(APPLICATION_PROBLEM_JSON.to_string()),
            data: Some(data),
        };
        response.set_header("Content-Type", APPLICATION_PROBLEM_JSON.to_string());
        response
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status, self.title, self.detail)
    }
}
