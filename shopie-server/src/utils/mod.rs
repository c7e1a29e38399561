//! Utility module
//!
//! - Logging setup ([`logger`])
//! - Request payload validation ([`validation`])
//! - Re-exported error types from `shared`

pub mod logger;
pub mod validation;

pub use shared::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use validation::validate_payload;
