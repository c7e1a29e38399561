//! Cart API Handlers
//!
//! Every mutation responds with the refreshed cart summary so clients
//! never need a second round trip to re-render the cart.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use shared::models::{AddItemRequest, CartSummary, RemoveItemRequest, UpdateItemRequest};

use crate::auth::Identity;
use crate::core::ServerState;
use crate::utils::{AppResult, validate_payload};

/// GET /api/cart - current cart with live product data
pub async fn get_cart(
    State(state): State<ServerState>,
    identity: Identity,
) -> AppResult<Json<CartSummary>> {
    Ok(Json(state.carts.summary(&identity.user_id, &state.catalog)))
}

/// POST /api/cart - add units of a product, reserving them
pub async fn add_item(
    State(state): State<ServerState>,
    identity: Identity,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<(StatusCode, Json<CartSummary>)> {
    validate_payload(&payload)?;
    state
        .carts
        .add_item(&identity.user_id, &payload.product_id, payload.quantity)?;
    Ok((
        StatusCode::CREATED,
        Json(state.carts.summary(&identity.user_id, &state.catalog)),
    ))
}

/// PATCH /api/cart/items/{item_id} - set an item's quantity
pub async fn update_item(
    State(state): State<ServerState>,
    identity: Identity,
    Path(item_id): Path<String>,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<CartSummary>> {
    validate_payload(&payload)?;
    state
        .carts
        .update_item_quantity(&identity.user_id, &item_id, payload.quantity)?;
    Ok(Json(state.carts.summary(&identity.user_id, &state.catalog)))
}

/// DELETE /api/cart/items/{item_id} - remove units (all when no body)
pub async fn remove_item(
    State(state): State<ServerState>,
    identity: Identity,
    Path(item_id): Path<String>,
    payload: Option<Json<RemoveItemRequest>>,
) -> AppResult<Json<CartSummary>> {
    let quantity = payload.and_then(|Json(p)| p.quantity);
    state
        .carts
        .remove_quantity(&identity.user_id, &item_id, quantity)?;
    Ok(Json(state.carts.summary(&identity.user_id, &state.catalog)))
}

/// DELETE /api/cart - release everything and empty the cart
pub async fn clear_cart(
    State(state): State<ServerState>,
    identity: Identity,
) -> AppResult<Json<CartSummary>> {
    state.carts.clear_cart(&identity.user_id)?;
    Ok(Json(state.carts.summary(&identity.user_id, &state.catalog)))
}
