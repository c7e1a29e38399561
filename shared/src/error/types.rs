//! Error types and API response structures

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// This is the primary error type for the Shopie backend, providing:
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages
/// - Optional structured details for debugging
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    /// Create a not authenticated error
    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// Create a product not found error
    pub fn product_not_found(product_id: impl Into<String>) -> Self {
        let id = product_id.into();
        Self::with_message(ErrorCode::ProductNotFound, format!("Product {} not found", id))
            .with_detail("product_id", id)
    }

    /// Create a cart item not found error
    pub fn cart_item_not_found(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::with_message(ErrorCode::CartItemNotFound, format!("Cart item {} not found", id))
            .with_detail("item_id", id)
    }

    /// Create an insufficient stock error carrying requested vs available
    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::new(ErrorCode::InsufficientStock)
            .with_detail("requested", requested)
            .with_detail("available", available)
    }

    /// Create an invalid adjustment error (total would shrink below reserved)
    pub fn invalid_adjustment(requested_total: u32, reserved: u32) -> Self {
        Self::new(ErrorCode::InvalidAdjustment)
            .with_detail("requested_total", requested_total)
            .with_detail("reserved", reserved)
    }

    /// Create a concurrency conflict error (retryable)
    pub fn concurrency_conflict(product_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConcurrencyConflict).with_detail("product_id", product_id.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }
}

/// Unified API response structure
///
/// Provides a consistent response format for all API endpoints:
/// - `code`: Error code (0 for success)
/// - `message`: Human-readable message
/// - `data`: Response payload (on success)
/// - `details`: Additional error details (on failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Error code (0 for success, non-zero for errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Additional error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }

    /// Create a success response with custom message and data
    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: Some(0),
            message: message.into(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    /// Create a success response without data
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: None,
            details: None,
        }
    }

    /// Create an error response from an AppError
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        // Log system errors
        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use super::codes::ErrorCode;
        use axum::Json;

        let status = if self.code == Some(0) || self.code.is_none() {
            http::StatusCode::OK
        } else {
            ErrorCode::try_from(self.code.unwrap_or(1))
                .map(|c| c.http_status())
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_details() {
        let err = AppError::insufficient_stock(6, 4);
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        let details = err.details.as_ref().unwrap();
        assert_eq!(details["requested"], 6);
        assert_eq!(details["available"], 4);
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(
            AppError::insufficient_stock(1, 0).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::product_not_found("p1").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::concurrency_conflict("p1").http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_api_response_from_error() {
        let err = AppError::invalid_adjustment(3, 6);
        let resp = ApiResponse::<()>::error(&err);
        assert_eq!(resp.code, Some(6003));
        assert!(resp.data.is_none());
        assert_eq!(resp.details.unwrap()["reserved"], 6);
    }

    #[test]
    fn test_api_response_success() {
        let resp = ApiResponse::success(42);
        assert_eq!(resp.code, Some(0));
        assert_eq!(resp.data, Some(42));
    }
}
