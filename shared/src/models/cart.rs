//! Cart and cart item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Cart entity
///
/// One cart per user, created lazily on first mutation and never
/// deleted (cleared, not destroyed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item in a cart
///
/// A product appears at most once per cart; repeated adds increase
/// `quantity` instead of duplicating items. `quantity` is always > 0 —
/// an item whose quantity would reach zero is deleted instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// Display fields of a product captured at read time
///
/// Never cached on the item; looked up live for every summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBrief {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub available_stock: u32,
}

/// Cart item with its product view, as returned by the summary endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
    /// `None` when the product no longer resolves (still counts toward
    /// `total_items`, contributes nothing to `total_price`)
    pub product: Option<ProductBrief>,
}

/// Computed cart summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub cart_id: String,
    pub user_id: String,
    pub items: Vec<CartItemView>,
    pub total_items: u32,
    pub total_price: Decimal,
}

impl CartSummary {
    /// Summary for a user who has never touched their cart
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            cart_id: String::new(),
            user_id: user_id.into(),
            items: Vec::new(),
            total_items: 0,
            total_price: Decimal::ZERO,
        }
    }
}

// ==================== Request payloads ====================

/// POST /api/cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

/// PATCH /api/cart/items/{item_id}
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

/// DELETE /api/cart/items/{item_id}
///
/// `quantity` defaults to the full held quantity when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveItemRequest {
    pub quantity: Option<u32>,
}
