use async_trait::async_trait;
use axion_core::AppError;
use serde_json::Value;

use crate::pipeline::{Middleware, RequestContext, StepOutcome, StepResults};

/// Exposes the query string to handlers under `__query`.
pub struct QueryParams;

#[async_trait]
impl Middleware for QueryParams {
    async fn handle(
        &self,
        ctx: &RequestContext,
        _results: &StepResults,
    ) -> Result<StepOutcome, AppError> {
        Ok(StepOutcome::Next(Value::Object(ctx.query.clone())))
    }
}
