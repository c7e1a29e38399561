//! Unified error codes for the Shopie backend
//!
//! This module defines all error codes used across the server and its
//! clients. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Cart errors
//! - 6xxx: Product and stock errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Identity headers are present but malformed
    InvalidIdentity = 1002,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,

    // ==================== 4xxx: Cart ====================
    /// Cart item not found
    CartItemNotFound = 4001,
    /// Removal quantity exceeds the quantity held in the cart
    RemovalExceedsHeld = 4002,

    // ==================== 6xxx: Product / Stock ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Requested reservation exceeds available stock
    InsufficientStock = 6002,
    /// Total stock cannot shrink below currently reserved stock
    InvalidAdjustment = 6003,
    /// Product is referenced by cart items and cannot be deleted
    ProductInUse = 6004,
    /// Product price must be positive
    ProductInvalidPrice = 6005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Optimistic retries exhausted under contention
    ConcurrencyConflict = 9002,
    /// Stock invariant broken (fatal bug signal)
    InvariantViolation = 9003,

    // ==================== 94xx: Storage ====================
    /// Ledger storage failure
    StorageFailure = 9401,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Check if the failed operation is safe to retry as-is
    ///
    /// Only contention-related failures qualify; business failures
    /// (insufficient stock, validation) need a changed request.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::ConcurrencyConflict)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::InvalidIdentity => "Identity headers are malformed",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Admin role required",

            // Cart
            ErrorCode::CartItemNotFound => "Cart item not found",
            ErrorCode::RemovalExceedsHeld => {
                "Removal quantity exceeds the quantity held in the cart"
            }

            // Product / Stock
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::InsufficientStock => "Insufficient stock available",
            ErrorCode::InvalidAdjustment => {
                "Cannot reduce total stock below currently reserved stock"
            }
            ErrorCode::ProductInUse => "Product is in carts and cannot be deleted",
            ErrorCode::ProductInvalidPrice => "Product price must be positive",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConcurrencyConflict => "Operation conflicted, please retry",
            ErrorCode::InvariantViolation => "Stock invariant violated",

            // Storage
            ErrorCode::StorageFailure => "Ledger storage failure",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidIdentity),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::AdminRequired),

            // Cart
            4001 => Ok(ErrorCode::CartItemNotFound),
            4002 => Ok(ErrorCode::RemovalExceedsHeld),

            // Product / Stock
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::InsufficientStock),
            6003 => Ok(ErrorCode::InvalidAdjustment),
            6004 => Ok(ErrorCode::ProductInUse),
            6005 => Ok(ErrorCode::ProductInvalidPrice),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::ConcurrencyConflict),
            9003 => Ok(ErrorCode::InvariantViolation),

            // Storage
            9401 => Ok(ErrorCode::StorageFailure),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
