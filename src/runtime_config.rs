//! # Runtime Configuration Module
//!
//! Environment variable based configuration for the validation pipeline.
//!
//! ## Environment Variables
//!
//! ### `BRRTGUARD_STRICT_VALIDATION`
//!
//! Reject query and form parameters the operation does not declare.
//! Accepts `1`/`true`/`yes`/`on` and `0`/`false`/`no`/`off`. Default: off.
//!
//! ### `BRRTGUARD_VALIDATE_RESPONSES`
//!
//! Validate handler output against the declared response schemas and
//! headers. Same values as above. Default: off.
//!
//! ### `BRRTGUARD_ARRAY_PARSER`
//!
//! How repeated occurrences of array parameters are merged: `strict`,
//! `first-value` or `always-multi`. Default: `strict`.
//!
//! ### `BRRTGUARD_SCHEMA_CACHE`
//!
//! `off` compiles every schema fragment separately instead of sharing
//! identical ones. Default: `on`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtguard::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Strict validation: {}", config.strict_validation);
//! ```
//!
//! Logging is configured separately, see [`crate::logging::LogConfig`].

use crate::validator::ArrayParser;
use std::env;
use tracing::warn;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub strict_validation: bool,
    pub validate_responses: bool,
    pub array_parser: ArrayParser,
    pub schema_cache: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            validate_responses: false,
            array_parser: ArrayParser::default(),
            schema_cache: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value. Invalid values are logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| match lookup(key) {
            Some(val) => parse_flag(&val).unwrap_or_else(|| {
                warn!(variable = key, value = %val, "Invalid boolean, using default");
                default
            }),
            None => default,
        };

        let array_parser = match lookup("BRRTGUARD_ARRAY_PARSER") {
            Some(val) => val.parse().unwrap_or_else(|e: String| {
                warn!(variable = "BRRTGUARD_ARRAY_PARSER", error = %e, "Invalid array parser, using default");
                defaults.array_parser
            }),
            None => defaults.array_parser,
        };

        RuntimeConfig {
            strict_validation: flag("BRRTGUARD_STRICT_VALIDATION", defaults.strict_validation),
            validate_responses: flag("BRRTGUARD_VALIDATE_RESPONSES", defaults.validate_responses),
            array_parser,
            schema_cache: flag("BRRTGUARD_SCHEMA_CACHE", defaults.schema_cache),
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
