use http::Method;
use once_cell::unsync::OnceCell;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

/// Maximum number of query/form/path entries before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// A request parameter value.
///
/// Transports deliver every occurrence as [`ParamValue::Single`]. The array
/// parser replaces array-typed parameters with a materialized
/// [`ParamValue::Array`] before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Array(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(s) => Some(s.as_str()),
            ParamValue::Array(_) => None,
        }
    }

    /// JSON view used by coercion: a string or an array of strings.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Single(s) => Value::String(s.clone()),
            ParamValue::Array(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Single(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Single(s)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::Array(items)
    }
}

/// Ordered multi-valued string mapping (query string, form fields, path captures).
///
/// Keys may repeat; insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: SmallVec<[(String, ParamValue); MAX_INLINE_PARAMS]>,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an occurrence of `name`.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Value for `name`.
    ///
    /// Uses "last write wins" semantics: for `?limit=10&limit=20` this
    /// returns `20`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// First occurrence of `name`.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Every occurrence of `name`, in request order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&ParamValue> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Distinct keys in first-appearance order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(self.entries.len());
        for (k, _) in &self.entries {
            if !keys.contains(&k.as_str()) {
                keys.push(k.as_str());
            }
        }
        keys
    }

    /// Replace every occurrence of `name` with a single entry.
    pub fn replace(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.entries.retain(|(k, _)| k != name);
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MultiMap
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MultiMap::new();
        for (k, v) in iter {
            map.push(k, v);
        }
        map
    }
}

/// An uploaded file, as handed over by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
            data: data.into(),
        }
    }
}

/// Transport-independent view of one HTTP request.
///
/// Built once per request by the transport adapter (see
/// [`ParsedRequest::from_http`]) and owned by a single pipeline invocation.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request URL, used in diagnostics
    pub url: String,
    /// Query string parameters
    pub query: MultiMap,
    /// Path parameters captured by the router
    pub path_params: MultiMap,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Form fields (urlencoded or multipart)
    pub form: MultiMap,
    /// Uploaded files keyed by field name
    pub files: HashMap<String, FileUpload>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Raw `Content-Type` header value
    pub content_type: Option<String>,
    /// Body after deserialization, coercion and validation
    pub body_data: Option<Value>,
    json: OnceCell<Option<Value>>,
}

impl ParsedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: MultiMap::new(),
            path_params: MultiMap::new(),
            headers: HashMap::new(),
            form: MultiMap::new(),
            files: HashMap::new(),
            body: Vec::new(),
            content_type: None,
            body_data: None,
            json: OnceCell::new(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query.push(name, value);
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.path_params.push(name, value);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.clone());
        }
        self.headers.insert(name.to_ascii_lowercase(), value);
        self
    }

    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.form.push(name, value);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: FileUpload) -> Self {
        self.files.insert(name.into(), file);
        self
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header("content-type", content_type)
    }

    /// Set the raw body. Resets the cached JSON view.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.json = OnceCell::new();
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// MIME essence of the content type (`application/json` for
    /// `application/json; charset=utf-8`), lowercased.
    #[must_use]
    pub fn mimetype(&self) -> Option<String> {
        self.content_type.as_deref().map(mime_essence)
    }

    /// The body parsed as JSON, computed on first access.
    ///
    /// `None` when the body is empty or is not valid JSON.
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| {
                if self.body.is_empty() {
                    return None;
                }
                match serde_json::from_slice::<Value>(&self.body) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        debug!(url = %self.url, error = %e, "JSON body parse failed");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// True when neither a raw body, form fields nor files were sent.
    #[must_use]
    pub fn is_body_empty(&self) -> bool {
        self.body.is_empty() && self.form.is_empty() && self.files.is_empty()
    }

    /// Build a request from an `http::Request`.
    ///
    /// Parses the query string, lowercases header names and decodes
    /// `application/x-www-form-urlencoded` bodies into [`ParsedRequest::form`].
    /// Path parameters come from the caller's router. Multipart bodies are left
    /// raw; transports that understand multipart fill `form` and `files`
    /// themselves.
    pub fn from_http<I, K, V>(req: http::Request<Vec<u8>>, path_params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let (parts, body) = req.into_parts();
        let url = parts.uri.to_string();

        let headers: HashMap<String, String> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let content_type = headers.get("content-type").cloned();

        let query = parts
            .uri
            .query()
            .map(parse_query_params)
            .unwrap_or_default();

        let form = match content_type.as_deref().map(mime_essence) {
            Some(ct) if ct == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
                parse_query_params(&String::from_utf8_lossy(&body))
            }
            _ => MultiMap::new(),
        };

        debug!(
            method = %parts.method,
            url = %url,
            header_count = headers.len(),
            query_count = query.len(),
            form_count = form.len(),
            body_size_bytes = body.len(),
            "HTTP request parsed"
        );

        Self {
            method: parts.method,
            url,
            query,
            path_params: path_params.into_iter().collect(),
            headers,
            form,
            files: HashMap::new(),
            body,
            content_type,
            body_data: None,
            json: OnceCell::new(),
        }
    }
}

/// Strip parameters from a content type and lowercase it.
///
/// Falls back to splitting on `;` for values the `mime` parser rejects.
pub fn mime_essence(content_type: &str) -> String {
    match content_type.parse::<mime::Mime>() {
        Ok(m) => m.essence_str().to_ascii_lowercase(),
        Err(_) => content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase(),
    }
}

/// Parse a query string (without the leading `?`) into an ordered multi-map.
///
/// Repeated keys are kept as separate occurrences.
pub fn parse_query_params(query: &str) -> MultiMap {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
