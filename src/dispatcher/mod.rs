//! # Dispatcher Module
//!
//! Wraps user handlers in the validation pipeline and routes requests to
//! them by operation id.
//!
//! ## Request Flow
//!
//! 1. Array parameters are consolidated
//! 2. Parameters are validated (query, path, header, formData)
//! 3. The body is checked against `consumes` and its schema
//! 4. User middleware runs
//! 5. The handler is invoked and its output shaped into an [`ApiResponse`]
//! 6. The response is validated when response validation is enabled
//!
//! Any failure in steps 1 to 4 short-circuits into a problem response and the
//! handler is not invoked.
//!
//! ## Handler Registration
//!
//! ```rust
//! use brrtguard::dispatcher::{Dispatcher, OperationOptions};
//! use brrtguard::server::ParsedRequest;
//! use brrtguard::spec::{OperationMeta, ParameterLocation, ParameterMeta};
//! use brrtguard::validator_cache::ValidatorCache;
//! use serde_json::json;
//!
//! let meta = OperationMeta::new("get_pet", http::Method::GET, "/pets/{id}")
//!     .with_parameter(ParameterMeta::new("id", ParameterLocation::Path, json!({"type": "integer"})));
//! let mut dispatcher = Dispatcher::new(vec![meta], OperationOptions::default(), ValidatorCache::default());
//! dispatcher
//!     .register_handler("get_pet", |req: &ParsedRequest| json!({"id": req.path_params.get("id").and_then(|v| v.as_str())}))
//!     .unwrap();
//!
//! let req = ParsedRequest::new(http::Method::GET, "/pets/x").with_path_param("id", "x");
//! let resp = dispatcher.dispatch("get_pet", req).unwrap();
//! assert_eq!(resp.status, 400);
//! ```
//!
//! [`ApiResponse`]: crate::server::ApiResponse

mod core;
mod operation;

pub use core::Dispatcher;
pub use operation::{operation_mimetype, Handler, HandlerOutput, Operation, OperationOptions};
