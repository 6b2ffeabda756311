use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable codes for business rule violations. Clients
/// branch on these; the human message may change, the code may not.
pub mod rules {
    pub const ACTIVE_LEASE_EXISTS: &str = "ACTIVE_LEASE_EXISTS";
    pub const USER_HAS_LEASE: &str = "USER_HAS_LEASE";
    pub const APARTMENT_HAS_LEASE: &str = "APARTMENT_HAS_LEASE";
    pub const APARTMENT_HAS_LEASES: &str = "APARTMENT_HAS_LEASES";
    pub const CHARGE_FULLY_PAID: &str = "CHARGE_FULLY_PAID";
    pub const AMOUNT_TOO_LOW: &str = "AMOUNT_TOO_LOW";
    pub const CANNOT_DELETE_PAID_CHARGE: &str = "CANNOT_DELETE_PAID_CHARGE";
    pub const NO_ACTIVE_LEASE: &str = "NO_ACTIVE_LEASE";
    pub const LEASE_NOT_ACTIVE: &str = "LEASE_NOT_ACTIVE";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const NO_ATTACHMENT: &str = "NO_ATTACHMENT";
    pub const INVALID_FILE_TYPE: &str = "INVALID_FILE_TYPE";
    pub const PAYMENT_EXCEEDS_CHARGE: &str = "PAYMENT_EXCEEDS_CHARGE";
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Malformed input shape or range, rejected before any state change.
    #[error("{0}")]
    Validation(String),
    /// A domain rule rejected the request. Carries its stable code.
    #[error("{1}")]
    Rule(&'static str, String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.clone())
            }
            Self::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message.clone())
            }
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message.clone()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone()),
            Self::Conflict(message) => (StatusCode::BAD_REQUEST, "CONFLICT", message.clone()),
            Self::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                message.clone(),
            ),
            Self::Validation(message) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
            ),
            Self::Rule(code, message) => (StatusCode::BAD_REQUEST, code, message.clone()),
            Self::Dependency(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DEPENDENCY_FAILURE",
                message.clone(),
            ),
            Self::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message.clone(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(status = %status, code, message, "Request failed");
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{rules, AppError};
    use axum::http::StatusCode;

    #[test]
    fn rule_violations_are_bad_requests_with_stable_codes() {
        let error = AppError::Rule(
            rules::ACTIVE_LEASE_EXISTS,
            "This apartment already has an active lease.".to_string(),
        );
        let (status, code, _) = error.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "ACTIVE_LEASE_EXISTS");
    }

    #[test]
    fn oversize_uploads_report_file_too_large() {
        let error = AppError::PayloadTooLarge("File exceeds the 5 MB limit.".to_string());
        let (status, code, _) = error.parts();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(code, "FILE_TOO_LARGE");
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let error = AppError::Validation("Amount must be greater than 0.".to_string());
        let (status, code, _) = error.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn dependency_failures_map_to_server_errors() {
        let error = AppError::Dependency("Database operation failed.".to_string());
        let (status, code, _) = error.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "DEPENDENCY_FAILURE");
    }

    #[test]
    fn conflicts_stay_within_the_client_error_contract() {
        let error = AppError::Conflict("An invitation is already pending.".to_string());
        let (status, code, _) = error.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "CONFLICT");
    }
}
