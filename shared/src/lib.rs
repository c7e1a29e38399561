//! Shared types for the Shopie backend
//!
//! Common types used across crates: the unified error system, API
//! response structures, and the catalog/cart domain models.

pub mod error;
pub mod models;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
