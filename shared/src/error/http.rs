//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 400 Bad Request
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::RemovalExceedsHeld
            | Self::InsufficientStock
            | Self::InvalidAdjustment
            | Self::ProductInvalidPrice => StatusCode::BAD_REQUEST,

            // 404 Not Found
            Self::NotFound | Self::CartItemNotFound | Self::ProductNotFound => {
                StatusCode::NOT_FOUND
            }

            // 401 Unauthorized
            Self::NotAuthenticated | Self::InvalidIdentity => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied | Self::AdminRequired => StatusCode::FORBIDDEN,

            // 409 Conflict
            Self::AlreadyExists | Self::ProductInUse | Self::ConcurrencyConflict => {
                StatusCode::CONFLICT
            }

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::InvariantViolation
            | Self::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
