use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::{Bytes, to_bytes};
use axum::extract::{ConnectInfo, Path, Query, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Map, Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

use crate::dispatcher::message_response;
use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::pipeline::RequestContext;
use crate::sanitize::sanitize_payload;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-site"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
    ),
];

fn parse_body(bytes: &Bytes) -> Result<Map<String, Value>, Response> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(message_response(
            StatusCode::BAD_REQUEST,
            "request body must be a JSON object",
        )),
        Err(_) => Err(message_response(StatusCode::BAD_REQUEST, "invalid JSON body")),
    }
}

fn parse_query(request: &Request) -> Map<String, Value> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(params)| {
            params
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// `/api/{module}/{function}`: builds a [`RequestContext`] and hands it to the dispatcher.
async fn api_call(
    State(state): State<AppState>,
    Path((module, function)): Path<(String, String)>,
    request: Request,
) -> Response {
    let method = request.method().clone();
    let headers = request.headers().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let query = sanitize_payload(parse_query(&request));

    let bytes = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return message_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
    };
    let body = match parse_body(&bytes) {
        Ok(body) => sanitize_payload(body),
        Err(response) => return response,
    };

    let ctx = RequestContext::new(module, function, method)
        .with_headers(headers)
        .with_peer(peer)
        .with_query(query)
        .with_body(body);

    state.dispatcher.dispatch(ctx).await
}

async fn health(State(state): State<AppState>) -> Response {
    let (cache_ok, cache_status, message) = match state.services.store.ping().await {
        Ok(()) => (true, "up", None),
        Err(e) => {
            warn!(error = %e, "Cache health check failed");
            (false, "down", Some("cache unavailable"))
        }
    };
    let status = if cache_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut body = json!({
        "ok": cache_ok,
        "code": status.as_u16(),
        "data": {
            "service": state.server.service_name,
            "env": state.server.environment,
            "timestamp": Utc::now().to_rfc3339(),
            "uptimeSec": state.uptime_secs(),
            "checks": {"app": "up", "cache": cache_status},
        },
    });
    if let Some(message) = message {
        body["message"] = Value::String(message.into());
    }

    (status, Json(body)).into_response()
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => message_response(StatusCode::NOT_FOUND, "metrics disabled"),
    }
}

async fn not_found() -> Response {
    message_response(StatusCode::NOT_FOUND, "endpoint not found")
}

/// Adds HSTS when the request arrived over HTTPS at the proxy.
async fn strict_transport_security(req: Request, next: Next) -> Response {
    let secure = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    let mut response = next.run(req).await;
    if secure {
        response.headers_mut().insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if state.cors.allow_all {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let allowed_origins: Vec<HeaderValue> = state
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(methods)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("token"),
        ])
        .allow_credentials(true)
}

pub fn init_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/{module}/{function}", any(api_call))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .fallback(not_found)
        .with_state(state.clone());

    for &(name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router
        .layer(middleware::from_fn(strict_transport_security))
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(&Bytes::from_static(b"")).unwrap(), Map::new());
        assert_eq!(parse_body(&Bytes::from_static(b"  \n")).unwrap(), Map::new());
        assert_eq!(
            parse_body(&Bytes::from_static(br#"{"a":1}"#)).unwrap()["a"],
            json!(1)
        );
        assert_eq!(
            parse_body(&Bytes::from_static(b"[1]")).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_body(&Bytes::from_static(b"{oops")).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
