use super::operation::{Handler, HandlerOutput, Operation, OperationOptions};
use crate::middleware::Middleware;
use crate::server::{ApiResponse, ParsedRequest};
use crate::spec::OperationMeta;
use crate::validator::{NonConformingResponse, Problem};
use crate::validator_cache::ValidatorCache;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry of operations keyed by operation id.
///
/// Created from the operations of a loaded document; handlers are attached
/// with [`Dispatcher::register_handler`], which builds the validation
/// pipeline for that operation.
#[derive(Clone)]
pub struct Dispatcher {
    specs: HashMap<String, OperationMeta>,
    operations: HashMap<String, Arc<Operation>>,
    /// Ordered list of user stages appended to every operation built afterwards
    middlewares: Vec<Arc<dyn Middleware>>,
    options: OperationOptions,
    cache: ValidatorCache,
}

impl Dispatcher {
    pub fn new(operations: Vec<OperationMeta>, options: OperationOptions, cache: ValidatorCache) -> Self {
        let specs = operations
            .into_iter()
            .map(|meta| (meta.operation_id.clone(), meta))
            .collect();
        Dispatcher {
            specs,
            operations: HashMap::new(),
            middlewares: Vec::new(),
            options,
            cache,
        }
    }

    /// Add a stage run after the built-in validation stages of every
    /// operation registered from now on.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Register a prebuilt operation, replacing any previous one with the
    /// same id.
    pub fn register(&mut self, operation: Operation) {
        let operation_id = operation.meta().operation_id.clone();
        if self.operations.contains_key(&operation_id) {
            warn!(operation_id = %operation_id, "Replaced existing handler");
        }
        info!(
            operation_id = %operation_id,
            total_handlers = self.operations.len() + 1,
            "Handler registered successfully"
        );
        self.operations.insert(operation_id, Arc::new(operation));
    }

    /// Attach `handler` to the declared operation `operation_id`.
    ///
    /// Fails when the id is not declared or one of the operation's schemas
    /// does not compile.
    pub fn register_handler<F, R>(&mut self, operation_id: &str, handler: F) -> anyhow::Result<()>
    where
        F: Fn(&ParsedRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        let meta = self
            .specs
            .get(operation_id)
            .cloned()
            .ok_or_else(|| anyhow!("operation '{operation_id}' is not declared"))?;
        let wrapped: Handler = Arc::new(move |req: &ParsedRequest| -> HandlerOutput { handler(req).into() });
        let operation = self
            .middlewares
            .iter()
            .fold(Operation::new(meta, wrapped, &self.options, &self.cache)?, |op, mw| {
                op.with_middleware(Arc::clone(mw))
            });
        self.register(operation);
        Ok(())
    }

    pub fn operation(&self, operation_id: &str) -> Option<&Arc<Operation>> {
        self.operations.get(operation_id)
    }

    /// Declared operation ids, sorted.
    pub fn operation_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Run `request` through the pipeline of `operation_id`.
    ///
    /// An id with no registered handler is answered with a 404 problem.
    pub fn dispatch(
        &self,
        operation_id: &str,
        request: ParsedRequest,
    ) -> Result<ApiResponse, NonConformingResponse> {
        debug!(
            operation_id = %operation_id,
            available_handlers = self.operations.len(),
            "Handler lookup"
        );
        match self.operations.get(operation_id) {
            Some(operation) => operation.call(request),
            None => {
                let available: Vec<&String> = self.operations.keys().collect();
                error!(
                    operation_id = %operation_id,
                    available_handlers = ?available,
                    "Handler not found"
                );
                Ok(Problem::not_found(format!("No handler registered for operation '{operation_id}'"))
                    .with_instance(request.url)
                    .to_response())
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("declared", &self.specs.len())
            .field("registered", &self.operations.len())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
