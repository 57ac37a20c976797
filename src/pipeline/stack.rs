use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axion_core::AppError;
use axion_core::errors::INTERNAL_SERVER_ERROR;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::context::{RequestContext, StepResults};

/// What a step decided: continue with a partial result, or stop the chain.
#[derive(Debug)]
pub enum StepOutcome {
    Next(Value),
    Reject(Rejection),
}

/// Terminal response produced by a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: StatusCode,
    pub errors: Vec<String>,
    pub message: Option<String>,
}

impl Rejection {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            errors: vec![error.into()],
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
    }
}

impl From<AppError> for Rejection {
    fn from(err: AppError) -> Self {
        if err.status.is_server_error() {
            error!(error = ?err.error, status = %err.status, "Middleware step failed");
        }
        Self::new(err.status, err.public_message())
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut body = json!({
            "ok": false,
            "code": self.status.as_u16(),
            "errors": self.errors,
        });
        if let Some(message) = self.message {
            body["message"] = Value::String(message);
        }
        (self.status, Json(body)).into_response()
    }
}

/// One named step of a chain.
///
/// Returning `Err` is treated like a rejection with the error's status.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        ctx: &RequestContext,
        results: &StepResults,
    ) -> Result<StepOutcome, AppError>;
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StackError {
    #[error("Unable to find middleware {0}")]
    UnknownMiddleware(String),
}

/// Named steps available to chains.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    steps: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, step: Arc<dyn Middleware>) -> Self {
        self.steps.insert(name.into(), step);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }
}

/// Builds chains from a fixed pre-stack plus an endpoint's own steps.
#[derive(Clone)]
pub struct VirtualStack {
    pre_stack: Vec<String>,
    registry: MiddlewareRegistry,
}

impl VirtualStack {
    pub fn new(registry: MiddlewareRegistry, pre_stack: &[&str]) -> Self {
        Self {
            pre_stack: pre_stack.iter().map(|s| s.to_string()).collect(),
            registry,
        }
    }

    pub fn registry(&self) -> &MiddlewareRegistry {
        &self.registry
    }

    /// Pre-stack first, then `stack`; a name seen twice keeps its first position.
    pub fn create_chain(&self, stack: &[&str]) -> Result<Chain, StackError> {
        let mut steps: Vec<(String, Arc<dyn Middleware>)> = Vec::new();

        let names = self
            .pre_stack
            .iter()
            .map(String::as_str)
            .chain(stack.iter().copied());
        for name in names {
            if steps.iter().any(|(existing, _)| existing == name) {
                continue;
            }
            let step = self
                .registry
                .get(name)
                .ok_or_else(|| StackError::UnknownMiddleware(name.to_string()))?;
            steps.push((name.to_string(), step));
        }

        Ok(Chain { steps })
    }
}

/// A resolved, ordered list of steps.
#[derive(Clone)]
pub struct Chain {
    steps: Vec<(String, Arc<dyn Middleware>)>,
}

impl Chain {
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Runs every step in order. Each step sees the results of the steps
    /// before it; the first rejection, error or panic ends the chain.
    pub async fn run(&self, ctx: &RequestContext) -> Result<StepResults, Rejection> {
        let mut results = StepResults::new();

        for (name, step) in &self.steps {
            let outcome = AssertUnwindSafe(step.handle(ctx, &results))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(StepOutcome::Next(value))) => {
                    results.insert(name.clone(), value);
                }
                Ok(Ok(StepOutcome::Reject(rejection))) => {
                    debug!(
                        step = %name,
                        module = %ctx.module,
                        function = %ctx.function,
                        status = rejection.status.as_u16(),
                        "Chain rejected"
                    );
                    return Err(rejection);
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    error!(step = %name, module = %ctx.module, function = %ctx.function, "Middleware step panicked");
                    return Err(Rejection::internal());
                }
            }
        }

        Ok(results)
    }
}
