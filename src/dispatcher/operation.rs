use crate::middleware::{ArrayParsingMiddleware, Middleware};
use crate::runtime_config::RuntimeConfig;
use crate::server::{all_json, make_response, ApiResponse, HeaderVec, ParamValue, ParsedRequest};
use crate::spec::OperationMeta;
use crate::validator::{
    ArrayParser, ContentHandlerRegistry, NonConformingResponse, ParameterValidator, Problem,
    RequestBodyValidator, ResponseValidator,
};
use crate::validator_cache::ValidatorCache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, field, info_span};

/// What a handler returns.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// Body answered with status 200
    Body(Value),
    WithStatus(Value, u16),
    WithHeaders(Value, u16, HeaderVec),
    /// A prebuilt response, passed through untouched
    Response(ApiResponse),
}

impl From<Value> for HandlerOutput {
    fn from(body: Value) -> Self {
        HandlerOutput::Body(body)
    }
}

impl From<(Value, u16)> for HandlerOutput {
    fn from((body, status): (Value, u16)) -> Self {
        HandlerOutput::WithStatus(body, status)
    }
}

impl From<(Value, u16, HeaderVec)> for HandlerOutput {
    fn from((body, status, headers): (Value, u16, HeaderVec)) -> Self {
        HandlerOutput::WithHeaders(body, status, headers)
    }
}

impl From<ApiResponse> for HandlerOutput {
    fn from(response: ApiResponse) -> Self {
        HandlerOutput::Response(response)
    }
}

impl From<Problem> for HandlerOutput {
    fn from(problem: Problem) -> Self {
        HandlerOutput::Response(problem.to_response())
    }
}

/// User code answering one operation.
pub type Handler = Arc<dyn Fn(&ParsedRequest) -> HandlerOutput + Send + Sync>;

/// Per-operation pipeline settings.
#[derive(Debug, Clone)]
pub struct OperationOptions {
    pub strict_validation: bool,
    pub validate_responses: bool,
    pub array_parser: ArrayParser,
    pub registry: Arc<ContentHandlerRegistry>,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for OperationOptions {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            strict_validation: config.strict_validation,
            validate_responses: config.validate_responses,
            array_parser: config.array_parser,
            registry: Arc::new(ContentHandlerRegistry::default()),
        }
    }
}

/// Mimetype handler output is serialized with: `application/json` when every
/// produced type is JSON, the single produced type otherwise.
pub fn operation_mimetype(produces: &[String]) -> String {
    match produces {
        [single] if !all_json(produces) => single.clone(),
        _ => mime::APPLICATION_JSON.to_string(),
    }
}

/// One operation with its validation pipeline wrapped around a handler.
///
/// Built once from an [`OperationMeta`]; schemas are compiled up front and the
/// result is shared read-only between requests.
pub struct Operation {
    meta: Arc<OperationMeta>,
    handler: Handler,
    mimetype: String,
    stages: Vec<Arc<dyn Middleware>>,
    response_validator: Option<ResponseValidator>,
}

impl Operation {
    /// Stages run as array parsing, parameters, then body, so a 415 is only
    /// reported once the parameters pass.
    pub fn new(
        meta: OperationMeta,
        handler: Handler,
        options: &OperationOptions,
        cache: &ValidatorCache,
    ) -> anyhow::Result<Self> {
        let operation_id = meta.operation_id.as_str();
        let mimetype = operation_mimetype(&meta.produces);

        let mut stages: Vec<Arc<dyn Middleware>> = Vec::with_capacity(3);
        stages.push(Arc::new(ArrayParsingMiddleware::new(
            options.array_parser,
            &meta.parameters,
        )));
        stages.push(Arc::new(ParameterValidator::new(
            operation_id,
            &meta.parameters,
            options.strict_validation,
            cache,
        )?));
        if let Some(body) = &meta.body {
            stages.push(Arc::new(RequestBodyValidator::new(
                operation_id,
                body,
                &meta.consumes,
                options.strict_validation,
                Arc::clone(&options.registry),
                cache,
            )?));
        }

        let response_validator = if options.validate_responses {
            Some(ResponseValidator::new(&meta, &mimetype, cache)?)
        } else {
            None
        };

        debug!(
            operation_id = operation_id,
            method = %meta.method,
            path = %meta.path_pattern,
            stages = stages.len(),
            mimetype = %mimetype,
            validate_responses = options.validate_responses,
            "Operation built"
        );

        Ok(Self {
            meta: Arc::new(meta),
            handler,
            mimetype,
            stages,
            response_validator,
        })
    }

    /// Append a stage after the built-in validation stages.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.stages.push(middleware);
        self
    }

    pub fn meta(&self) -> &OperationMeta {
        &self.meta
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Run the pipeline for one request.
    ///
    /// Request-side failures are answered with a problem response. A response
    /// that contradicts its declaration is returned as `Err` when response
    /// validation is enabled.
    pub fn call(&self, mut request: ParsedRequest) -> Result<ApiResponse, NonConformingResponse> {
        let span = info_span!(
            "request",
            operation_id = %self.meta.operation_id,
            method = %request.method,
            url = %request.url,
            status = field::Empty,
        );
        let _guard = span.enter();
        let start = Instant::now();

        let rejected = self.stages.iter().find_map(|stage| match stage.before(&mut request) {
            Ok(()) => None,
            Err(problem) => {
                debug!(
                    stage = stage.name(),
                    status = problem.status,
                    detail = %problem.detail,
                    "Request rejected"
                );
                Some(problem)
            }
        });

        let was_rejected = rejected.is_some();
        let mut response = match rejected {
            Some(problem) => problem.to_response(),
            None => self.shape((self.handler)(&request)),
        };

        let latency = start.elapsed();
        for stage in &self.stages {
            stage.after(&request, &mut response, latency);
        }
        span.record("status", response.status);

        // Problems raised by the pipeline are not part of the declared responses
        if was_rejected {
            return Ok(response);
        }
        if let Some(validator) = &self.response_validator {
            if let Err(e) = validator.validate(&response, &request.url) {
                error!(error = %e, "Handler response does not conform to the operation");
                return Err(e);
            }
        }
        Ok(response)
    }

    /// Build a [`ParsedRequest`] from an `http::Request`, run [`Self::call`]
    /// and convert the result back.
    pub fn call_http<I, K, V>(
        &self,
        request: http::Request<Vec<u8>>,
        path_params: I,
    ) -> Result<http::Response<Vec<u8>>, NonConformingResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let parsed = ParsedRequest::from_http(request, path_params);
        self.call(parsed).map(ApiResponse::into_http)
    }

    fn shape(&self, output: HandlerOutput) -> ApiResponse {
        match output {
            HandlerOutput::Body(body) => make_response(body, 200, HeaderVec::new(), &self.mimetype),
            HandlerOutput::WithStatus(body, status) => {
                make_response(body, status, HeaderVec::new(), &self.mimetype)
            }
            HandlerOutput::WithHeaders(body, status, headers) => {
                make_response(body, status, headers, &self.mimetype)
            }
            HandlerOutput::Response(response) => response,
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("operation_id", &self.meta.operation_id)
            .field("mimetype", &self.mimetype)
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("validate_responses", &self.response_validator.is_some())
            .finish()
    }
}
