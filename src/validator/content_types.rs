//! Content handlers: classify a request body by its `Content-Type`.
//!
//! The built-in set covers octet streams, JSON, urlencoded forms and multipart
//! forms. Applications with other body formats add a [`ContentHandler::custom`]
//! entry to the registry when operations are built.

use crate::server::{mime_essence, ParsedRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

static STREAMING_RE: Lazy<Regex> = Lazy::new(|| compile_builtin(r"^application/octet-stream.*"));
static JSON_RE: Lazy<Regex> = Lazy::new(|| compile_builtin(r"^application/json.*|^.*\+json$"));
static FORM_RE: Lazy<Regex> = Lazy::new(|| compile_builtin(r"^application/x-www-form-urlencoded.*"));
static MULTIPART_RE: Lazy<Regex> = Lazy::new(|| compile_builtin(r"^multipart/form-data.*"));

#[allow(clippy::expect_used)]
fn compile_builtin(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in content type pattern is valid")
}

/// Turns a raw request body into a JSON value for schema validation.
pub trait ContentDeserializer: Send + Sync {
    fn deserialize(&self, request: &ParsedRequest) -> Result<Value, String>;
}

impl<F> ContentDeserializer for F
where
    F: Fn(&ParsedRequest) -> Result<Value, String> + Send + Sync,
{
    fn deserialize(&self, request: &ParsedRequest) -> Result<Value, String> {
        self(request)
    }
}

/// What the body validator does with a matched body.
#[derive(Clone)]
pub enum ContentHandlerKind {
    /// Left for the handler to read; never validated
    Streaming,
    Json,
    FormUrlEncoded,
    MultipartFormData,
    Custom(Arc<dyn ContentDeserializer>),
}

impl fmt::Debug for ContentHandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentHandlerKind::Streaming => write!(f, "Streaming"),
            ContentHandlerKind::Json => write!(f, "Json"),
            ContentHandlerKind::FormUrlEncoded => write!(f, "FormUrlEncoded"),
            ContentHandlerKind::MultipartFormData => write!(f, "MultipartFormData"),
            ContentHandlerKind::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// A named content type pattern and the way matching bodies are handled.
///
/// `name` is a media type; listing it in an operation's `consumes` accepts
/// every content type the pattern matches.
#[derive(Debug, Clone)]
pub struct ContentHandler {
    pub name: String,
    pub regex: Regex,
    pub kind: ContentHandlerKind,
}

impl ContentHandler {
    pub fn streaming() -> Self {
        Self {
            name: mime::APPLICATION_OCTET_STREAM.to_string(),
            regex: STREAMING_RE.clone(),
            kind: ContentHandlerKind::Streaming,
        }
    }

    pub fn json() -> Self {
        Self {
            name: mime::APPLICATION_JSON.to_string(),
            regex: JSON_RE.clone(),
            kind: ContentHandlerKind::Json,
        }
    }

    pub fn form_urlencoded() -> Self {
        Self {
            name: mime::APPLICATION_WWW_FORM_URLENCODED.to_string(),
            regex: FORM_RE.clone(),
            kind: ContentHandlerKind::FormUrlEncoded,
        }
    }

    pub fn multipart_form_data() -> Self {
        Self {
            name: mime::MULTIPART_FORM_DATA.to_string(),
            regex: MULTIPART_RE.clone(),
            kind: ContentHandlerKind::MultipartFormData,
        }
    }

    /// A user-supplied handler. Fails if `pattern` is not a valid regex.
    pub fn custom<D>(name: impl Into<String>, pattern: &str, deserializer: D) -> Result<Self, regex::Error>
    where
        D: ContentDeserializer + 'static,
    {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            kind: ContentHandlerKind::Custom(Arc::new(deserializer)),
        })
    }

    /// Match against a MIME essence (see [`mime_essence`]).
    pub fn matches(&self, essence: &str) -> bool {
        self.regex.is_match(essence)
    }
}

/// Ordered set of content handlers, built once and shared by every operation.
#[derive(Debug, Clone)]
pub struct ContentHandlerRegistry {
    handlers: Vec<ContentHandler>,
}

impl Default for ContentHandlerRegistry {
    fn default() -> Self {
        Self {
            handlers: vec![
                ContentHandler::streaming(),
                ContentHandler::json(),
                ContentHandler::form_urlencoded(),
                ContentHandler::multipart_form_data(),
            ],
        }
    }
}

impl ContentHandlerRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Append a handler after the ones already registered.
    pub fn register(&mut self, handler: ContentHandler) {
        debug!(name = %handler.name, pattern = %handler.regex, "Content handler registered");
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: ContentHandler) -> Self {
        self.register(handler);
        self
    }

    pub fn handlers(&self) -> &[ContentHandler] {
        &self.handlers
    }

    /// Select the handler for `content_type`.
    ///
    /// Parameters such as `charset` are ignored. When several handlers match
    /// the first registered one wins and the overlap is logged.
    pub fn lookup(&self, content_type: &str) -> Option<&ContentHandler> {
        let essence = mime_essence(content_type);
        let mut matches = self.handlers.iter().filter(|h| h.matches(&essence));
        let first = matches.next()?;
        let others: Vec<&str> = matches.map(|h| h.name.as_str()).collect();
        if !others.is_empty() {
            warn!(
                content_type = %essence,
                selected = %first.name,
                also_matching = ?others,
                "Content could be handled by multiple content handlers"
            );
        }
        Some(first)
    }
}
