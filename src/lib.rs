//! # brrtguard
//!
//! **brrtguard** validates, coerces and dispatches HTTP requests according to
//! an OpenAPI 3 or Swagger 2 specification.
//!
//! ## Overview
//!
//! Each operation in a specification is turned into an
//! [`Operation`](dispatcher::Operation): a chain of request stages wrapped
//! around a user handler. Transports hand over a
//! [`ParsedRequest`](server::ParsedRequest) and get back an
//! [`ApiResponse`](server::ApiResponse); invalid requests are answered with an
//! RFC 7807 [`Problem`](validator::Problem) and never reach the handler.
//!
//! ## Architecture
//!
//! - **[`spec`]** - Loading Swagger 2 / OpenAPI 3 documents into [`OperationMeta`]
//! - **[`server`]** - Transport-independent request and response types
//! - **[`validator`]** - Array parsing, type coercion, parameter, body and response validation
//! - **[`middleware`]** - The stage trait the pipeline is built from
//! - **[`dispatcher`]** - Operation assembly and dispatch by operation id
//! - **[`validator_cache`]** - Shared compiled JSON Schema validators
//! - **[`runtime_config`]** / **[`logging`]** - Environment driven configuration
//! - **[`cli`]** - `brrtguard inspect` and `brrtguard check`
//!
//! ## Request pipeline
//!
//! ```text
//! ParsedRequest
//!   -> array parsing       (collectionFormat / style+explode)
//!   -> parameter validation (query, path, header, formData)
//!   -> body validation      (content type, deserialization, schema)
//!   -> user middleware
//!   -> handler
//!   -> response shaping     (status, headers, serialization)
//!   -> response validation  (optional)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use brrtguard::{load_spec_from_str, Dispatcher, OperationOptions, ParsedRequest, ValidatorCache};
//! use http::Method;
//! use serde_json::json;
//!
//! let spec = r#"
//! openapi: 3.0.0
//! info: {title: pets, version: "1"}
//! paths:
//!   /pets:
//!     get:
//!       operationId: list_pets
//!       parameters:
//!         - {name: limit, in: query, schema: {type: integer}}
//!       responses:
//!         "200": {description: ok}
//! "#;
//! let operations = load_spec_from_str(spec).unwrap();
//! let mut dispatcher = Dispatcher::new(operations, OperationOptions::default(), ValidatorCache::default());
//! dispatcher
//!     .register_handler("list_pets", |_req: &ParsedRequest| json!([]))
//!     .unwrap();
//!
//! let request = ParsedRequest::new(Method::GET, "/pets").with_query("limit", "ten");
//! let response = dispatcher.dispatch("list_pets", request).unwrap();
//! assert_eq!(response.status, 400);
//! ```

pub mod cli;
pub mod dispatcher;
pub mod logging;
pub mod middleware;
pub mod runtime_config;
pub mod server;
pub mod spec;
pub mod validator;
pub mod validator_cache;

pub use dispatcher::{Dispatcher, Handler, HandlerOutput, Operation, OperationOptions};
pub use runtime_config::RuntimeConfig;
pub use server::{ApiResponse, ParsedRequest};
pub use spec::{
    load_spec, load_spec_from_str, load_spec_from_value, CollectionFormat, OperationMeta,
    ParameterLocation, ParameterMeta, RequestBodyMeta, ResponseSpec,
};
pub use validator::{ArrayParser, Problem, ValidationError};
pub use validator_cache::ValidatorCache;
