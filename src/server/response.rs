use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::warn;

/// Maximum inline response headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>` since the same few names (Content-Type,
/// Location) are set over and over.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Uniform response produced by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    pub headers: HeaderVec,
    /// Serialized body
    pub body: Vec<u8>,
    pub mimetype: Option<String>,
    /// Structured body before serialization, kept for response validation
    pub data: Option<Value>,
}

impl ApiResponse {
    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Body decoded as JSON: the retained structured data, or a parse of the
    /// serialized bytes for prebuilt responses.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        self.data
            .clone()
            .or_else(|| serde_json::from_slice(&self.body).ok())
    }

    /// Body as UTF-8 text (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert into an `http::Response` for the host transport.
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(self.status);
        let has_content_type = self.get_header("content-type").is_some();
        for (name, value) in &self.headers {
            builder = builder.header(name.as_ref(), value.as_str());
        }
        if !has_content_type {
            if let Some(mimetype) = &self.mimetype {
                builder = builder.header(http::header::CONTENT_TYPE, mimetype.as_str());
            }
        }
        match builder.body(self.body) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Invalid response parts, answering 500");
                let mut resp = http::Response::new(Vec::new());
                *resp.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                resp
            }
        }
    }
}

/// True for `application/json` and any `application/*+json` type.
pub fn is_json_mimetype(mimetype: &str) -> bool {
    let essence = super::request::mime_essence(mimetype);
    match essence.split_once('/') {
        Some((main, sub)) => main == "application" && (sub == "json" || sub.ends_with("+json")),
        None => false,
    }
}

/// True when every mimetype is JSON (vacuously true for an empty list).
pub fn all_json(mimetypes: &[String]) -> bool {
    mimetypes.iter().all(|m| is_json_mimetype(m))
}

/// Serialize a body the way JSON responses are rendered: pretty printed with
/// a trailing newline.
pub fn dumps(data: &Value) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(data).unwrap_or_default();
    out.push(b'\n');
    out
}

/// Build the uniform response representation.
///
/// JSON mimetypes serialize `body` with [`dumps`]; other mimetypes send string
/// bodies as raw text and anything else as compact JSON. A `null` body
/// produces an empty payload.
pub fn make_response(body: Value, status: u16, headers: HeaderVec, mimetype: &str) -> ApiResponse {
    let bytes = match &body {
        Value::Null => Vec::new(),
        _ if is_json_mimetype(mimetype) => dumps(&body),
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    };
    let mut response = ApiResponse {
        status,
        headers,
        body: bytes,
        mimetype: Some(mimetype.to_string()),
        data: Some(body),
    };
    if response.get_header("content-type").is_none() {
        response.set_header("Content-Type", mimetype.to_string());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_json_mimetype() {
        assert!(is_json_mimetype("application/json"));
        assert!(is_json_mimetype("application/x.custom+json"));
        assert!(is_json_mimetype("application/problem+json; charset=utf-8"));
        assert!(!is_json_mimetype("text/json"));
        assert!(!is_json_mimetype("application/xml"));
    }

    #[test]
    fn test_all_json() {
        assert!(all_json(&[]));
        assert!(all_json(&[
            "application/json".to_string(),
            "application/x.custom+json".to_string()
        ]));
        assert!(!all_json(&["application/json".to_string(), "other/type".to_string()]));
    }

    #[test]
    fn test_make_response_json_is_pretty_with_newline() {
        let resp = make_response(json!({"id": 1}), 201, HeaderVec::new(), "application/json");
        assert_eq!(resp.status, 201);
        assert!(resp.text().ends_with("}\n"));
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_make_response_text_passthrough() {
        let resp = make_response(json!("hello"), 200, HeaderVec::new(), "text/plain");
        assert_eq!(resp.text(), "hello");
    }

    #[test]
    fn test_into_http_keeps_headers() {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("Location"), "/pets/1".to_string()));
        let resp = make_response(json!({"id": 1}), 201, headers, "application/json").into_http();
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.headers()["location"], "/pets/1");
        assert_eq!(resp.headers()["content-type"], "application/json");
    }
}
