//! # CLI Module
//!
//! Command-line access to the operation loader and the validation pipeline.
//!
//! ## Commands
//!
//! ### `inspect`
//!
//! List the operations of a document with their parameters and media types:
//!
//! ```bash
//! brrtguard inspect --spec openapi.yaml
//! ```
//!
//! ### `check`
//!
//! Run one request through an operation's pipeline, answered by an echo
//! handler, and print the resulting status and body:
//!
//! ```bash
//! brrtguard check --spec openapi.yaml --operation list_pets \
//!     --query limit=10 --query tags=a,b --strict
//!
//! brrtguard check --spec openapi.yaml --operation add_pet \
//!     --content-type application/json --body '{"name": "Fluffy"}'
//! ```
//!
//! Runtime options come from the `BRRTGUARD_*` environment variables (see
//! [`crate::runtime_config`]); command-line flags take precedence.

mod commands;


pub use commands::{echo_handler, execute, run_cli, Cli, Commands};
