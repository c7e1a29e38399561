//! Product API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use shared::models::{Product, ProductCreate, ProductUpdate};

use crate::auth::Identity;
use crate::core::ServerState;
use crate::utils::{AppResult, validate_payload};

/// GET /api/products - list all products with live counters
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list()))
}

/// GET /api/products/{id} - a single product
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let product = state.catalog.get(&id)?;
    Ok(Json(product))
}

/// POST /api/products - create a product (admin only)
pub async fn create(
    State(state): State<ServerState>,
    identity: Identity,
    Json(payload): Json<ProductCreate>,
) -> AppResult<(StatusCode, Json<Product>)> {
    validate_payload(&payload)?;
    let product = state.catalog.create(&identity, payload)?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PATCH /api/products/{id} - update descriptive fields and/or total stock
pub async fn update(
    State(state): State<ServerState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    validate_payload(&payload)?;
    let product = state.catalog.update(&identity, &id, payload)?;
    Ok(Json(product))
}

/// DELETE /api/products/{id} - delete a product no cart holds
pub async fn delete(
    State(state): State<ServerState>,
    identity: Identity,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.catalog.delete(&identity, &id, &state.carts)?;
    Ok(StatusCode::NO_CONTENT)
}
