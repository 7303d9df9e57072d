//! Request and response validation.
//!
//! Each stage of the pipeline lives in its own module:
//!
//! - [`array_parsing`] consolidates array-typed parameters
//! - [`parameters`] validates query, path, header and formData parameters
//! - [`body`] checks the content type and validates the request body
//! - [`response`] validates handler output when response validation is on
//!
//! Request-side failures are [`ValidationError`]s, answered as [`Problem`]
//! responses. Response-side failures are [`NonConformingResponse`] errors.

pub mod array_parsing;
pub mod body;
pub mod coerce;
pub mod content_types;
mod error;
pub mod parameters;
mod problem;
pub mod response;

pub use array_parsing::ArrayParser;
pub use body::{RequestBodyValidator, ResponseBodyValidator};
pub use coerce::{coerce_type, is_null, is_nullable};
pub use content_types::{ContentDeserializer, ContentHandler, ContentHandlerKind, ContentHandlerRegistry};
pub use error::{NonConformingResponse, TypeCoercionError, ValidationError};
pub use parameters::ParameterValidator;
pub use problem::{Problem, APPLICATION_PROBLEM_JSON};
pub use response::ResponseValidator;

pub use crate::server::is_json_mimetype;
