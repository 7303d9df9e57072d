use http::Method;
use serde_json::Value;
use std::collections::HashMap;

/// Where a declared parameter is read from.
///
/// The variant order is the validation order: query, path, header, formData.
/// Request bodies are described separately by [`RequestBodyMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    FormData,
}

impl ParameterLocation {
    /// All locations in validation order.
    pub const ORDERED: [ParameterLocation; 4] = [
        ParameterLocation::Query,
        ParameterLocation::Path,
        ParameterLocation::Header,
        ParameterLocation::FormData,
    ];

    /// Parse the `in` field of a parameter object.
    ///
    /// Returns `None` for `body` (handled as a request body) and for `cookie`,
    /// which this crate does not validate.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(ParameterLocation::Query),
            "path" => Some(ParameterLocation::Path),
            "header" => Some(ParameterLocation::Header),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::FormData => write!(f, "formdata"),
        }
    }
}

/// Encoding convention for array values carried in a single string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    /// Comma separated: `a,b,c`
    #[default]
    Csv,
    /// Space separated: `a b c`
    Ssv,
    /// Tab separated
    Tsv,
    /// Pipe separated: `a|b|c`
    Pipes,
    /// Repeated keys: `?x=a&x=b`
    Multi,
}

impl CollectionFormat {
    /// Parse a Swagger 2 `collectionFormat` value. Unknown values fall back to csv.
    pub fn parse(s: &str) -> Self {
        match s {
            "ssv" => CollectionFormat::Ssv,
            "tsv" => CollectionFormat::Tsv,
            "pipes" => CollectionFormat::Pipes,
            "multi" => CollectionFormat::Multi,
            _ => CollectionFormat::Csv,
        }
    }

    /// Map an OpenAPI 3 `style`/`explode` pair onto the equivalent collection format.
    ///
    /// `explode` defaults to `true` for `form` style and `false` otherwise.
    pub fn from_style(style: Option<&str>, explode: Option<bool>, location: ParameterLocation) -> Self {
        let style = style.unwrap_or(match location {
            ParameterLocation::Query | ParameterLocation::FormData => "form",
            ParameterLocation::Path | ParameterLocation::Header => "simple",
        });
        match style {
            "form" => {
                if explode.unwrap_or(true) {
                    CollectionFormat::Multi
                } else {
                    CollectionFormat::Csv
                }
            }
            "spaceDelimited" => CollectionFormat::Ssv,
            "pipeDelimited" => CollectionFormat::Pipes,
            _ => CollectionFormat::Csv,
        }
    }

    /// Delimiter used to split a single occurrence. `multi` occurrences are
    /// additionally split on commas.
    pub fn delimiter(&self) -> char {
        match self {
            CollectionFormat::Csv | CollectionFormat::Multi => ',',
            CollectionFormat::Ssv => ' ',
            CollectionFormat::Tsv => '\t',
            CollectionFormat::Pipes => '|',
        }
    }
}

impl std::fmt::Display for CollectionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectionFormat::Csv => "csv",
            CollectionFormat::Ssv => "ssv",
            CollectionFormat::Tsv => "tsv",
            CollectionFormat::Pipes => "pipes",
            CollectionFormat::Multi => "multi",
        };
        write!(f, "{}", s)
    }
}

/// A declared operation parameter.
///
/// `schema` is a JSON Schema fragment ready for validation: for Swagger 2 it
/// is built from the parameter object itself with `name`, `in`, `required`
/// and `collectionFormat` stripped; for OpenAPI 3 it is the parameter's
/// `schema` with references expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
    pub collection_format: CollectionFormat,
    /// `nullable` on the schema or `x-nullable` on the parameter
    pub nullable: bool,
}

impl ParameterMeta {
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: Value) -> Self {
        let nullable = schema_is_nullable(&schema);
        Self {
            name: name.into(),
            location,
            required: location == ParameterLocation::Path,
            schema,
            collection_format: CollectionFormat::Csv,
            nullable,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_collection_format(mut self, format: CollectionFormat) -> Self {
        self.collection_format = format;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The declared `type` keyword, if any.
    pub fn schema_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(Value::as_str)
    }

    pub fn is_array(&self) -> bool {
        self.schema_type() == Some("array")
    }

    /// File uploads are only checked for presence.
    pub fn is_file(&self) -> bool {
        self.schema_type() == Some("file")
            || self.schema.get("format").and_then(Value::as_str) == Some("binary")
    }
}

/// True when a schema fragment allows `null` through `nullable` or `x-nullable`.
pub fn schema_is_nullable(schema: &Value) -> bool {
    schema.get("nullable").and_then(Value::as_bool).unwrap_or(false)
        || schema.get("x-nullable").and_then(Value::as_bool).unwrap_or(false)
}

/// The request body declared by an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodyMeta {
    pub schema: Value,
    pub required: bool,
    pub nullable: bool,
}

impl RequestBodyMeta {
    pub fn new(schema: Value) -> Self {
        let nullable = schema_is_nullable(&schema);
        Self {
            schema,
            required: false,
            nullable,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// A `default` on the body schema suppresses schema failures.
    pub fn has_default(&self) -> bool {
        self.schema.get("default").is_some()
    }
}

/// Declared response for one status code (or `default`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseSpec {
    pub schema: Option<Value>,
    /// Header names that must be present on the response
    pub required_headers: Vec<String>,
}

/// Responses keyed by status code string (`"200"`) or `"default"`.
pub type Responses = HashMap<String, ResponseSpec>;

/// Everything the validation pipeline needs to know about one operation.
#[derive(Debug, Clone)]
pub struct OperationMeta {
    pub operation_id: String,
    pub method: Method,
    pub path_pattern: String,
    pub parameters: Vec<ParameterMeta>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub body: Option<RequestBodyMeta>,
    pub responses: Responses,
}

impl OperationMeta {
    pub fn new(operation_id: impl Into<String>, method: Method, path_pattern: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            method,
            path_pattern: path_pattern.into(),
            parameters: Vec::new(),
            consumes: vec![mime::APPLICATION_JSON.to_string()],
            produces: vec![mime::APPLICATION_JSON.to_string()],
            body: None,
            responses: Responses::new(),
        }
    }

    pub fn with_parameter(mut self, param: ParameterMeta) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_consumes<I, S>(mut self, consumes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consumes = consumes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_produces<I, S>(mut self, produces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces = produces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_body(mut self, body: RequestBodyMeta) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_response(mut self, status: impl Into<String>, response: ResponseSpec) -> Self {
        self.responses.insert(status.into(), response);
        self
    }

    /// Parameters declared at `location`, in declaration order.
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &ParameterMeta> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Response declared for `status`, falling back to `default`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses
            .get(status.to_string().as_str())
            .or_else(|| self.responses.get("default"))
    }
}
