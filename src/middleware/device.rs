use async_trait::async_trait;
use axion_core::AppError;
use serde_json::json;

use crate::pipeline::{Middleware, RequestContext, StepOutcome, StepResults};

const UNKNOWN: &str = "N/A";

/// Client IP: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn client_ip(ctx: &RequestContext) -> Option<String> {
    let forwarded = ctx
        .header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    if let Some(ip) = ctx.header("x-real-ip") {
        return Some(ip.to_string());
    }

    ctx.peer.map(|addr| addr.ip().to_string())
}

/// Forwards `{ip, agent}` describing the caller.
pub struct DeviceContext;

#[async_trait]
impl Middleware for DeviceContext {
    async fn handle(
        &self,
        ctx: &RequestContext,
        _results: &StepResults,
    ) -> Result<StepOutcome, AppError> {
        let ip = client_ip(ctx).unwrap_or_else(|| UNKNOWN.to_string());
        let agent = ctx.header("user-agent").unwrap_or(UNKNOWN);
        Ok(StepOutcome::Next(json!({ "ip": ip, "agent": agent })))
    }
}
