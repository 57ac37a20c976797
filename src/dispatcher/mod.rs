//! Maps `module` + verb + `function` to a handler behind its middleware chain.
//!
//! Endpoints are declared up front with [`DispatcherBuilder::register`],
//! naming the ordered middleware steps they need. [`DispatcherBuilder::build`]
//! resolves every chain, so an unknown step name fails at startup instead of
//! on the first request.

pub mod handler;
pub mod reply;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tracing::{debug, error};

use crate::pipeline::{Chain, RequestContext, StackError, VirtualStack};

pub use handler::{HandlerFn, HandlerInput, handler, with_state};
pub use reply::{Failure, HandlerResult, data, message_response, reply_response};

struct Registration {
    module: String,
    method: Method,
    function: String,
    middleware: Vec<String>,
    handler: HandlerFn,
}

struct Endpoint {
    function: String,
    chain: Chain,
    handler: HandlerFn,
}

#[derive(Default)]
struct ModuleRoutes {
    /// Verbs in registration order, lowercase.
    verbs: Vec<(String, Vec<Endpoint>)>,
}

impl ModuleRoutes {
    fn endpoints(&self, verb: &str) -> Option<&[Endpoint]> {
        self.verbs
            .iter()
            .find(|(v, _)| v == verb)
            .map(|(_, endpoints)| endpoints.as_slice())
    }

    fn allowed(&self) -> String {
        self.verbs
            .iter()
            .map(|(v, _)| v.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct DispatcherBuilder {
    stack: VirtualStack,
    registrations: Vec<Registration>,
}

impl DispatcherBuilder {
    pub fn register(
        mut self,
        module: &str,
        method: Method,
        function: &str,
        middleware: &[&str],
        handler: HandlerFn,
    ) -> Self {
        self.registrations.push(Registration {
            module: module.to_string(),
            method,
            function: function.to_string(),
            middleware: middleware.iter().map(|s| s.to_string()).collect(),
            handler,
        });
        self
    }

    pub fn build(self) -> Result<Dispatcher, StackError> {
        let mut modules: HashMap<String, ModuleRoutes> = HashMap::new();

        for registration in self.registrations {
            let names: Vec<&str> = registration.middleware.iter().map(String::as_str).collect();
            let chain = self.stack.create_chain(&names)?;
            let verb = registration.method.as_str().to_lowercase();

            let routes = modules.entry(registration.module.clone()).or_default();
            let endpoint = Endpoint {
                function: registration.function,
                chain,
                handler: registration.handler,
            };
            match routes.verbs.iter_mut().find(|(v, _)| *v == verb) {
                Some((_, endpoints)) => endpoints.push(endpoint),
                None => routes.verbs.push((verb, vec![endpoint])),
            }
        }

        Ok(Dispatcher { modules })
    }
}

pub struct Dispatcher {
    modules: HashMap<String, ModuleRoutes>,
}

impl Dispatcher {
    pub fn builder(stack: VirtualStack) -> DispatcherBuilder {
        DispatcherBuilder {
            stack,
            registrations: Vec::new(),
        }
    }

    /// Middleware names for an endpoint, pre-stack included.
    pub fn chain_for(&self, module: &str, method: &Method, function: &str) -> Option<Vec<&str>> {
        let verb = method.as_str().to_lowercase();
        self.modules
            .get(module)?
            .endpoints(&verb)?
            .iter()
            .find(|e| e.function == function)
            .map(|e| e.chain.names())
    }

    pub async fn dispatch(&self, ctx: RequestContext) -> Response {
        let verb = ctx.method.as_str().to_lowercase();

        let Some(routes) = self.modules.get(&ctx.module) else {
            return message_response(
                StatusCode::NOT_FOUND,
                format!("module {} not found", ctx.module),
            );
        };

        let Some(endpoints) = routes.endpoints(&verb) else {
            return message_response(
                StatusCode::METHOD_NOT_ALLOWED,
                format!(
                    "unsupported method {} for {}. allowed: {}",
                    verb,
                    ctx.module,
                    routes.allowed()
                ),
            );
        };

        let Some(endpoint) = endpoints.iter().find(|e| e.function == ctx.function) else {
            return message_response(
                StatusCode::NOT_FOUND,
                format!("unable to find function {} with method {}", ctx.function, verb),
            );
        };

        let results = match endpoint.chain.run(&ctx).await {
            Ok(results) => results,
            Err(rejection) => return rejection.into_response(),
        };

        debug!(module = %ctx.module, function = %ctx.function, "Dispatching to handler");
        let input = HandlerInput::new(ctx.body, results);
        let result = match AssertUnwindSafe((endpoint.handler)(input))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(module = %ctx.module, function = %ctx.function, "Handler panicked");
                Err(Failure::internal())
            }
        };

        reply_response(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MiddlewareRegistry;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn explode(_: HandlerInput) -> HandlerResult {
        panic!("handler exploded")
    }

    fn dispatcher() -> Dispatcher {
        let stack = VirtualStack::new(MiddlewareRegistry::new(), &[]);
        Dispatcher::builder(stack)
            .register(
                "auth",
                Method::POST,
                "v1_login",
                &[],
                handler(|input: HandlerInput| async move { Ok(Value::Object(input.body)) }),
            )
            .register(
                "auth",
                Method::GET,
                "v1_me",
                &[],
                handler(|_| async { Err(Failure::error("user not found")) }),
            )
            .register(
                "auth",
                Method::GET,
                "v1_boom",
                &[],
                handler(explode),
            )
            .build()
            .unwrap()
    }

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_module() {
        let response = dispatcher()
            .dispatch(RequestContext::new("schools", "v1_list", Method::GET))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["message"], "module schools not found");
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_verbs_in_order() {
        let response = dispatcher()
            .dispatch(RequestContext::new("auth", "v1_login", Method::DELETE))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body(response).await["message"],
            "unsupported method delete for auth. allowed: POST, GET"
        );
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let response = dispatcher()
            .dispatch(RequestContext::new("auth", "v1_login", Method::GET))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(response).await["message"],
            "unable to find function v1_login with method get"
        );
    }

    #[tokio::test]
    async fn test_handler_results() {
        let mut payload = serde_json::Map::new();
        payload.insert("email".into(), json!("a@b.co"));
        let response = dispatcher()
            .dispatch(RequestContext::new("auth", "v1_login", Method::POST).with_body(payload))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, json!({"ok": true, "data": {"email": "a@b.co"}}));

        let response = dispatcher()
            .dispatch(RequestContext::new("auth", "v1_me", Method::GET))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_panic_is_500() {
        let response = dispatcher()
            .dispatch(RequestContext::new("auth", "v1_boom", Method::GET))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(response).await,
            json!({"ok": false, "code": 500, "message": "internal server error"})
        );
    }

    #[test]
    fn test_unknown_middleware_fails_build() {
        let stack = VirtualStack::new(MiddlewareRegistry::new(), &[]);
        let result = Dispatcher::builder(stack)
            .register(
                "auth",
                Method::GET,
                "v1_me",
                &["__missing"],
                handler(|_| async { Ok(Value::Null) }),
            )
            .build();
        assert!(matches!(result, Err(StackError::UnknownMiddleware(name)) if name == "__missing"));
    }
}
