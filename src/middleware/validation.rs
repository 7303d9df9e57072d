//! The built-in request stages, in the order an operation runs them.

use super::Middleware;
use crate::server::ParsedRequest;
use crate::spec::ParameterMeta;
use crate::validator::{ArrayParser, ParameterValidator, Problem, RequestBodyValidator};

/// Materializes array-typed parameters before they are validated.
pub struct ArrayParsingMiddleware {
    parser: ArrayParser,
    parameters: Vec<ParameterMeta>,
}

impl ArrayParsingMiddleware {
    pub fn new(parser: ArrayParser, parameters: &[ParameterMeta]) -> Self {
        Self {
            parser,
            parameters: parameters.iter().filter(|p| p.is_array()).cloned().collect(),
        }
    }
}

impl Middleware for ArrayParsingMiddleware {
    fn name(&self) -> &str {
        "array_parsing"
    }

    fn before(&self, req: &mut ParsedRequest) -> Result<(), Problem> {
        self.parser.normalize(&self.parameters, req);
        Ok(())
    }
}

impl Middleware for ParameterValidator {
    fn name(&self) -> &str {
        "parameter_validation"
    }

    fn before(&self, req: &mut ParsedRequest) -> Result<(), Problem> {
        self.validate(req).map_err(Problem::from)
    }
}

impl Middleware for RequestBodyValidator {
    fn name(&self) -> &str {
        "body_validation"
    }

    fn before(&self, req: &mut ParsedRequest) -> Result<(), Problem> {
        self.validate(req).map_err(Problem::from)
    }
}
