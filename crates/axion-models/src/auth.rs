//! Request and response DTOs for the `auth` and `authorization` modules.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::users::PublicUser;

/// Passwords need 8..=128 characters with upper, lower, and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 || password.len() > 128 {
        return Err(ValidationError::new("password_length")
            .with_message("password must be between 8 and 128 characters".into()));
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(ValidationError::new("password_strength")
            .with_message("password must include uppercase, lowercase, and number".into()));
    }

    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSuperadminRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[validate(length(min = 2, max = 80, message = "firstName must be between 2 and 80 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 80, message = "lastName must be between 2 and 80 characters"))]
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchoolAdminRequest {
    #[validate(length(min = 3, max = 64, message = "schoolId must be between 3 and 64 characters"))]
    pub school_id: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[validate(length(min = 2, max = 80, message = "firstName must be between 2 and 80 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 80, message = "lastName must be between 2 and 80 characters"))]
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 64, message = "userId must be between 3 and 64 characters"))]
    pub user_id: String,
    #[validate(email(message = "email is invalid"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: Option<String>,
    #[validate(length(min = 2, max = 80, message = "firstName must be between 2 and 80 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 80, message = "lastName must be between 2 and 80 characters"))]
    pub last_name: Option<String>,
    pub status: Option<String>,
    #[validate(length(min = 3, max = 64, message = "schoolId must be between 3 and 64 characters"))]
    pub school_id: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.status.is_none()
            && self.school_id.is_none()
    }
}

/// Body for endpoints that only name a target user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    #[validate(length(min = 3, max = 64, message = "userId must be between 3 and 64 characters"))]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "refreshToken is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(length(min = 3, max = 50, message = "role must be between 3 and 50 characters"))]
    #[serde(default)]
    pub role: Option<String>,
}

/// Permission list arrives unchecked; the engine owns its validation rules.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SetRolePermissionsRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_password_strength_rules() {
        assert!(validate_password_strength("Passw0rd").is_ok());
        assert!(validate_password_strength("short1A").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
    }

    #[test]
    fn test_bootstrap_request_uses_camel_case() {
        let req: BootstrapSuperadminRequest = serde_json::from_value(json!({
            "email": "root@school.io",
            "password": "Passw0rd!",
            "firstName": "Root",
            "lastName": "Admin"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.first_name, "Root");
    }

    #[test]
    fn test_update_user_optional_fields_validate_when_present() {
        let req: UpdateUserRequest = serde_json::from_value(json!({
            "userId": "user-123",
            "email": "not-an-email"
        }))
        .unwrap();
        assert!(req.validate().is_err());
        assert!(!req.is_empty());
    }
}
