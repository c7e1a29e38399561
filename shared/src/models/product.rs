//! Product Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Product entity as exposed on the API
///
/// The three stock counters always satisfy
/// `total_stock == available_stock + reserved_stock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category: Option<String>,
    /// Admin-declared inventory ceiling
    pub total_stock: u32,
    /// Units not currently reserved by any cart
    pub available_stock: u32,
    /// Units held by outstanding cart items
    pub reserved_stock: u32,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category: Option<String>,
    pub total_stock: u32,
}

/// Update product payload
///
/// A `total_stock` change routes through the reservation service's
/// total adjustment and can fail if it would shrink below reserved stock.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub total_stock: Option<u32>,
}
