use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};
use serde_json::{Map, Value};

/// Accumulated step outputs, keyed by step name (`__auth`, `__device`, ...).
pub type StepResults = Map<String, Value>;

/// What a middleware step gets to look at for one dispatched call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub module: String,
    pub function: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
}

impl RequestContext {
    pub fn new(module: impl Into<String>, function: impl Into<String>, method: Method) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            method,
            headers: HeaderMap::new(),
            peer: None,
            query: Map::new(),
            body: Map::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    /// Trimmed header value; empty and non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_lookup_ignores_blank_values() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("  curl/8.0 "));
        headers.insert("x-real-ip", HeaderValue::from_static("   "));
        let ctx = RequestContext::new("auth", "v1_me", Method::GET).with_headers(headers);

        assert_eq!(ctx.header("User-Agent"), Some("curl/8.0"));
        assert_eq!(ctx.header("x-real-ip"), None);
        assert_eq!(ctx.header("token"), None);
    }
}
