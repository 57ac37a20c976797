use axion_core::errors::validation_messages;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::dispatcher::Failure;

fn deserialize_message(error: &serde_json::Error) -> String {
    let error_msg = error.to_string();

    if error_msg.contains("missing field") {
        let field = error_msg
            .split("missing field `")
            .nth(1)
            .and_then(|s| s.split('`').next())
            .unwrap_or("unknown");
        return format!("{} is required", field);
    }

    if error_msg.contains("invalid type") {
        return "invalid field type in request".to_string();
    }

    "invalid request body".to_string()
}

/// Deserializes a dispatched payload and runs its validation rules.
/// Every message ends up in [`Failure::errors`] so the call maps to 400.
pub fn parse_payload<T>(payload: Map<String, Value>) -> Result<T, Failure>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_value(Value::Object(payload))
        .map_err(|e| Failure::errors(vec![deserialize_message(&e)]))?;

    value
        .validate()
        .map_err(|errors| Failure::errors(validation_messages(&errors)))?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axion_models::{LoginRequest, UserIdRequest};
    use axum::http::StatusCode;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_missing_field_is_required() {
        let failure = parse_payload::<LoginRequest>(object(json!({"email": "a@b.co"}))).unwrap_err();
        assert_eq!(failure.errors, Some(vec!["password is required".to_string()]));
        assert_eq!(failure.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wrong_type() {
        let failure = parse_payload::<UserIdRequest>(object(json!({"userId": 42}))).unwrap_err();
        assert_eq!(
            failure.errors,
            Some(vec!["invalid field type in request".to_string()])
        );
    }

    #[test]
    fn test_validation_rules_run() {
        let failure = parse_payload::<LoginRequest>(object(json!({
            "email": "not-an-email",
            "password": "x"
        })))
        .unwrap_err();
        assert_eq!(failure.errors, Some(vec!["email is invalid".to_string()]));
    }

    #[test]
    fn test_valid_payload() {
        let login = parse_payload::<LoginRequest>(object(json!({
            "email": "admin@axion.test",
            "password": "Secret123"
        })))
        .unwrap();
        assert_eq!(login.email, "admin@axion.test");
    }
}
