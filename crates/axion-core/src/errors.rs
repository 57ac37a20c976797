use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use validator::ValidationErrors;

/// Generic message returned for any 5xx so no internal detail reaches the client.
pub const INTERNAL_SERVER_ERROR: &str = "internal server error";

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
        }
    }

    fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: Error::msg(message.into()),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::message(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    pub fn conflict<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::CONFLICT, err)
    }

    pub fn validation(errors: &ValidationErrors) -> Self {
        Self::message(StatusCode::BAD_REQUEST, validation_messages(errors).join(", "))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::message(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::message(StatusCode::FORBIDDEN, message)
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::message(StatusCode::LOCKED, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::message(StatusCode::TOO_MANY_REQUESTS, message)
    }

    /// Message safe to show a client: the error text for 4xx, a generic one for 5xx.
    pub fn public_message(&self) -> String {
        if self.status.is_server_error() {
            INTERNAL_SERVER_ERROR.to_string()
        } else {
            self.error.to_string()
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.status.as_u16())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.error, status = %self.status, "request failed");
        }

        let body = Json(json!({
            "ok": false,
            "code": self.status.as_u16(),
            "errors": [self.public_message()],
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}

/// Flattens validator output into one message per failing rule.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|msg| msg.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages
}
