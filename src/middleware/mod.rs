mod core;
mod validation;

pub use core::Middleware;
pub use validation::ArrayParsingMiddleware;
