use std::sync::Arc;

use async_trait::async_trait;
use axion_config::RateLimitConfig;
use axion_core::{AppError, Clock};
use axion_store::{DataStore, KvStore, StoreError};
use axum::http::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use super::device::client_ip;
use crate::metrics::track_rate_limit_rejection;
use crate::pipeline::{Middleware, Rejection, RequestContext, StepOutcome, StepResults};

/// Fixed-window request counter per `ip:module:function`.
pub struct RateLimit {
    kv: Arc<dyn KvStore>,
    store: DataStore,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimit {
    pub fn new(store: DataStore, config: RateLimitConfig) -> Self {
        Self {
            kv: store.kv().clone(),
            clock: store.clock().clone(),
            store,
            config,
        }
    }

    fn key(&self, ip: &str, ctx: &RequestContext) -> String {
        let bucket = self.config.bucket(self.clock.now_secs());
        self.store
            .keys()
            .rate_limit(ip, &ctx.module, &ctx.function, bucket)
    }

    async fn count(&self, key: &str) -> Result<i64, StoreError> {
        let count = self.kv.incr_by(key, 1).await?;
        self.kv.expire(key, self.config.counter_ttl_secs()).await?;
        Ok(count)
    }
}

#[async_trait]
impl Middleware for RateLimit {
    async fn handle(
        &self,
        ctx: &RequestContext,
        _results: &StepResults,
    ) -> Result<StepOutcome, AppError> {
        let ip = client_ip(ctx).unwrap_or_else(|| "unknown".to_string());
        let key = self.key(&ip, ctx);
        let limit = self.config.max_requests;
        let window = self.config.window_secs;

        let count = match self.count(&key).await {
            Ok(count) => count,
            Err(e) if self.config.fail_open => {
                warn!(error = %e, "Rate limit store failed, letting request through");
                return Ok(StepOutcome::Next(json!({
                    "ip": ip,
                    "rateLimit": {"limit": limit, "windowSec": window, "count": 0, "bypassed": true},
                })));
            }
            Err(e) => {
                warn!(error = %e, "Rate limit store failed");
                return Ok(StepOutcome::Reject(Rejection::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service unavailable",
                )));
            }
        };

        if count > limit as i64 {
            debug!(ip = %ip, module = %ctx.module, function = %ctx.function, count, "Rate limit exceeded");
            track_rate_limit_rejection(&ctx.module);
            return Ok(StepOutcome::Reject(
                Rejection::new(StatusCode::TOO_MANY_REQUESTS, "too many requests")
                    .with_message(format!("Rate limit exceeded ({} requests/{}s)", limit, window)),
            ));
        }

        Ok(StepOutcome::Next(json!({
            "ip": ip,
            "rateLimit": {"limit": limit, "windowSec": window, "count": count},
        })))
    }
}
