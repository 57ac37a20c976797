use axion_auth::TokenError;
use axion_core::AppError;
use axion_core::errors::INTERNAL_SERVER_ERROR;
use axion_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use crate::authorization::PolicyError;

/// What a handler returns: data for the client, or a [`Failure`].
pub type HandlerResult = Result<Value, Failure>;

/// Handler-level failure. The HTTP status is derived by [`Failure::status`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    pub code: Option<u16>,
    pub error: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl Failure {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn errors(errors: Vec<String>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn internal() -> Self {
        Self::error(INTERNAL_SERVER_ERROR).with_code(500)
    }

    /// Explicit `code` first, then the `errors` list, then keywords in `error`.
    pub fn status(&self) -> StatusCode {
        if let Some(code) = self.code {
            return StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        }

        if let Some(errors) = self.errors.as_ref().filter(|e| !e.is_empty()) {
            if errors.iter().any(|e| is_internal(&e.to_lowercase())) {
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
            return StatusCode::BAD_REQUEST;
        }

        let Some(error) = &self.error else {
            return StatusCode::BAD_REQUEST;
        };

        let normalized = error.trim().to_lowercase();
        if normalized.contains("unauthorized") {
            StatusCode::UNAUTHORIZED
        } else if normalized.contains("forbidden") {
            StatusCode::FORBIDDEN
        } else if normalized.contains("not found") {
            StatusCode::NOT_FOUND
        } else if normalized.contains("already exists") || normalized.contains("already in use") {
            StatusCode::CONFLICT
        } else if is_internal(&normalized) {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

fn is_internal(message: &str) -> bool {
    message.contains(INTERNAL_SERVER_ERROR) || message.contains("failed to execute")
}

impl From<AppError> for Failure {
    fn from(err: AppError) -> Self {
        if err.status.is_server_error() {
            error!(error = ?err.error, status = %err.status, "Handler failed");
            return Self::internal();
        }
        Self::error(err.public_message()).with_code(err.status.as_u16())
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        AppError::internal(err).into()
    }
}

impl From<TokenError> for Failure {
    fn from(err: TokenError) -> Self {
        AppError::internal(err).into()
    }
}

impl From<PolicyError> for Failure {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Store(e) => e.into(),
            invalid => Self::error(invalid.to_string()),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match (self.errors, self.error) {
            (Some(errors), _) => json!({
                "ok": false,
                "code": status.as_u16(),
                "errors": errors,
            }),
            (None, error) => json!({
                "ok": false,
                "code": status.as_u16(),
                "message": error.unwrap_or_else(|| "bad request".to_string()),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Serializes handler output into the `data` payload.
pub fn data<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| {
        error!(error = %e, "Failed to serialize handler output");
        Failure::internal()
    })
}

/// `{ok:false, code, message}` with the given status.
pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "ok": false,
        "code": status.as_u16(),
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

pub fn reply_response(result: HandlerResult) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(json!({ "ok": true, "data": data }))).into_response(),
        Err(failure) => failure.into_response(),
    }
}
