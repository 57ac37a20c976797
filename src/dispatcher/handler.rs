use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use super::reply::{Failure, HandlerResult};
use crate::middleware::{self, auth::AuthContext};
use crate::pipeline::StepResults;
use crate::validator::parse_payload;

pub type HandlerFn = Arc<dyn Fn(HandlerInput) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wraps an async closure as a [`HandlerFn`].
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |input| f(input).boxed())
}

/// Like [`handler`], handing each call a clone of `state`.
pub fn with_state<S, F, Fut>(state: S, f: F) -> HandlerFn
where
    S: Clone + Send + Sync + 'static,
    F: Fn(S, HandlerInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |input| f(state.clone(), input).boxed())
}

/// Request body fields plus everything the middleware chain produced.
#[derive(Debug, Clone, Default)]
pub struct HandlerInput {
    pub body: Map<String, Value>,
    pub results: StepResults,
}

impl HandlerInput {
    pub fn new(body: Map<String, Value>, results: StepResults) -> Self {
        Self { body, results }
    }

    pub fn payload<T>(&self) -> Result<T, Failure>
    where
        T: DeserializeOwned + Validate,
    {
        parse_payload(self.body.clone())
    }

    /// Query parameters forwarded by the `__query` step, validated as `T`.
    pub fn query<T>(&self) -> Result<T, Failure>
    where
        T: DeserializeOwned + Validate,
    {
        let query = self
            .results
            .get(middleware::QUERY)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        parse_payload(query)
    }

    pub fn auth(&self) -> Option<AuthContext> {
        self.results
            .get(middleware::AUTH)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}
