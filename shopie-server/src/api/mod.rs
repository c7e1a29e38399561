//! API route modules
//!
//! - [`health`] - liveness and invariant diagnostics
//! - [`products`] - product catalog endpoints
//! - [`cart`] - cart endpoints

pub mod cart;
pub mod health;
pub mod products;
