//! # Schema Validator Cache Module
//!
//! Thread-safe cache of compiled JSON Schema validators.
//!
//! ## Overview
//!
//! Compiling a schema is far more expensive than validating against it. Every
//! schema fragment an operation needs (one per parameter, the request body,
//! one per declared response) is compiled once while operations are built and
//! then shared read-only by every request through an `Arc`.
//!
//! ## Cache Key Structure
//!
//! Keys are the hex SHA-256 of the schema's canonical JSON serialization, so
//! identical fragments used by several operations (a shared `Pet` definition,
//! the same `limit` parameter) compile only once.
//!
//! ## Thread Safety
//!
//! The cache uses `Arc<RwLock<HashMap>>`. The lock is only contended while
//! operations are being built; request handling holds its own `Arc`s.
//!
//! ## Configuration
//!
//! The cache can be disabled via `BRRTGUARD_SCHEMA_CACHE=off`, in which case
//! every fragment is compiled separately.

use anyhow::anyhow;
use jsonschema::Validator;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info};

/// Compile a schema fragment with the settings the whole crate validates
/// with: Draft 4 semantics and format checking enabled.
pub fn compile_schema(schema: &Value) -> Result<Validator, jsonschema::ValidationError<'static>> {
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft4)
        .should_validate_formats(true)
        .build(schema)
}

/// Hex SHA-256 of the schema's serialized form.
pub fn schema_hash(schema: &Value) -> String {
    let bytes = serde_json::to_vec(schema).unwrap_or_default();
    Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Thread-safe cache for compiled JSON Schema validators.
///
/// # Example
///
/// ```rust
/// use brrtguard::validator_cache::ValidatorCache;
/// use serde_json::json;
///
/// let cache = ValidatorCache::new(true);
/// let schema = json!({"type": "integer", "minimum": 1});
/// let validator = cache.get_or_compile("list_pets", "query:limit", &schema).unwrap();
/// assert!(validator.is_valid(&json!(5)));
/// assert_eq!(cache.size(), 1);
/// ```
#[derive(Clone)]
pub struct ValidatorCache {
    cache: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
    enabled: bool,
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ValidatorCache {
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing JSON Schema validator cache");
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a cached validator or compile and cache a new one.
    ///
    /// `operation_id` and `kind` (for example `"body"` or `"response:200"`)
    /// only label log lines and the error returned when compilation fails.
    ///
    /// # Performance
    ///
    /// - Cache hit: read lock + HashMap lookup
    /// - Cache miss: write lock + compilation
    pub fn get_or_compile(
        &self,
        operation_id: &str,
        kind: &str,
        schema: &Value,
    ) -> anyhow::Result<Arc<Validator>> {
        let compile = || {
            compile_schema(schema).map(Arc::new).map_err(|e| {
                error!(
                    operation_id = operation_id,
                    kind = kind,
                    error = %e,
                    "Failed to compile JSON Schema"
                );
                anyhow!("invalid {kind} schema for operation '{operation_id}': {e}")
            })
        };

        if !self.enabled {
            return compile();
        }

        let key = schema_hash(schema);

        // Fast path: read lock only
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = cache.get(&key) {
                debug!(
                    operation_id = operation_id,
                    kind = kind,
                    cache_key = %key,
                    "Schema validator cache hit"
                );
                return Ok(Arc::clone(validator));
            }
        }

        let validator = compile()?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another builder may have compiled the same fragment meanwhile
        if let Some(existing) = cache.get(&key) {
            return Ok(Arc::clone(existing));
        }
        cache.insert(key.clone(), Arc::clone(&validator));
        debug!(
            operation_id = operation_id,
            kind = kind,
            cache_key = %key,
            cache_size = cache.len(),
            "Schema validator compiled and cached"
        );
        Ok(validator)
    }

    /// Number of validators currently cached.
    pub fn size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every cached validator. Operations already built keep theirs.
    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = cache.len();
        cache.clear();
        info!(dropped = dropped, "Schema validator cache cleared");
    }
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("enabled", &self.enabled)
            .field("size", &self.size())
            .finish()
    }
}
