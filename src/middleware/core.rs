use std::time::Duration;

use crate::server::{ApiResponse, ParsedRequest};
use crate::validator::Problem;

/// One stage of an operation's request pipeline.
///
/// `before` runs in registration order and may reject the request with a
/// [`Problem`], which short-circuits the remaining stages and the handler.
/// `after` sees every response, including problems raised by earlier stages.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
    fn before(&self, _req: &mut ParsedRequest) -> Result<(), Problem> {
        Ok(())
    }
    fn after(&self, _req: &ParsedRequest, _res: &mut ApiResponse, _latency: Duration) {}
}
