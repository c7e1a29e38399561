//! Cart Aggregate Manager
//!
//! One aggregate per user: the cart row plus its items, guarded by the
//! sharded map's entry lock so all mutations of a user's cart are
//! serialized. Stock moves through the reservation service first; the cart
//! mutation lands only after the counters committed, and a failed item
//! persist is compensated by the inverse counter move so held quantities
//! and reserved stock stay in step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use shared::models::{Cart, CartItem, CartItemView, CartSummary};
use shared::{AppError, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::reservation::{ReservationError, ReservationService};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart item not found: {0}")]
    ItemNotFound(String),

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("cannot remove {requested}, only {held} held")]
    RemovalExceedsHeld { requested: u32, held: u32 },

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(id) => AppError::cart_item_not_found(&id),
            CartError::InvalidQuantity => AppError::invalid_request("quantity must be positive"),
            CartError::RemovalExceedsHeld { requested, held } => {
                AppError::new(ErrorCode::RemovalExceedsHeld)
                    .with_detail("requested", requested)
                    .with_detail("held", held)
            }
            CartError::Reservation(e) => e.into(),
            CartError::Storage(e) => {
                AppError::new(ErrorCode::StorageFailure).with_detail("cause", e.to_string())
            }
        }
    }
}

pub type CartResult<T> = Result<T, CartError>;

/// A user's cart row together with its items, keyed by item id
#[derive(Debug, Clone)]
struct CartAggregate {
    cart: Cart,
    items: HashMap<String, CartItem>,
}

/// All carts, keyed by user id
pub struct CartManager {
    carts: DashMap<String, CartAggregate>,
    reservation: Arc<ReservationService>,
    storage: Storage,
}

impl CartManager {
    /// Rebuild all cart aggregates from persisted rows
    pub fn load(storage: Storage, reservation: Arc<ReservationService>) -> CartResult<Self> {
        let carts: DashMap<String, CartAggregate> = DashMap::new();
        let mut by_cart_id: HashMap<String, String> = HashMap::new();

        for (user_id, cart) in storage.load_carts::<Cart>()? {
            by_cart_id.insert(cart.id.clone(), user_id.clone());
            carts.insert(
                user_id,
                CartAggregate {
                    cart,
                    items: HashMap::new(),
                },
            );
        }

        for (item_id, item) in storage.load_cart_items::<CartItem>()? {
            let Some(user_id) = by_cart_id.get(&item.cart_id) else {
                tracing::warn!(item_id, cart_id = %item.cart_id, "Orphaned cart item, dropping");
                storage.remove_cart_item(&item_id)?;
                continue;
            };
            if let Some(mut aggregate) = carts.get_mut(user_id) {
                aggregate.items.insert(item_id, item);
            }
        }

        let manager = Self {
            carts,
            reservation,
            storage,
        };
        tracing::info!(carts = manager.carts.len(), "Cart aggregates loaded");
        Ok(manager)
    }

    /// Held quantity per product across every cart
    ///
    /// This is the authoritative side of the reservation identity: the
    /// reserved counter of each product must equal its sum here.
    pub fn reserved_by_product(&self) -> HashMap<String, u32> {
        let mut sums: HashMap<String, u32> = HashMap::new();
        for aggregate in self.carts.iter() {
            for item in aggregate.items.values() {
                *sums.entry(item.product_id.clone()).or_insert(0) += item.quantity;
            }
        }
        sums
    }

    /// How many carts currently hold a product
    pub fn product_reference_count(&self, product_id: &str) -> usize {
        self.carts
            .iter()
            .filter(|aggregate| {
                aggregate
                    .items
                    .values()
                    .any(|item| item.product_id == product_id)
            })
            .count()
    }

    /// Add units of a product to the user's cart, reserving them first
    ///
    /// Adding a product that is already in the cart merges into the
    /// existing line. The reservation is rolled back if the item row
    /// cannot be persisted.
    pub fn add_item(&self, user_id: &str, product_id: &str, quantity: u32) -> CartResult<CartItem> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut aggregate = self.get_or_create_aggregate(user_id)?;

        self.reservation.reserve(product_id, quantity)?;

        let existing = aggregate
            .items
            .values()
            .find(|item| item.product_id == product_id)
            .map(|item| item.id.clone());

        let item = match existing {
            Some(item_id) => {
                let mut updated = aggregate.items[&item_id].clone();
                updated.quantity += quantity;
                if let Err(e) = self.storage.persist_cart_item(&item_id, &updated) {
                    self.rollback_reserve(product_id, quantity);
                    return Err(e.into());
                }
                aggregate.items.insert(item_id.clone(), updated.clone());
                updated
            }
            None => {
                let new_item = CartItem {
                    id: Uuid::new_v4().to_string(),
                    cart_id: aggregate.cart.id.clone(),
                    product_id: product_id.to_string(),
                    quantity,
                    added_at: Utc::now(),
                };
                if let Err(e) = self.storage.persist_cart_item(&new_item.id, &new_item) {
                    self.rollback_reserve(product_id, quantity);
                    return Err(e.into());
                }
                aggregate.items.insert(new_item.id.clone(), new_item.clone());
                new_item
            }
        };

        self.touch_cart(&mut aggregate, user_id);
        Ok(item)
    }

    /// Set an item's quantity, reserving or releasing the difference
    pub fn update_item_quantity(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> CartResult<CartItem> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut aggregate = self
            .carts
            .get_mut(user_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        let current = aggregate
            .items
            .get(item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?
            .clone();

        if quantity == current.quantity {
            return Ok(current);
        }

        let product_id = current.product_id.clone();
        if quantity > current.quantity {
            let delta = quantity - current.quantity;
            self.reservation.reserve(&product_id, delta)?;

            let mut updated = current;
            updated.quantity = quantity;
            if let Err(e) = self.storage.persist_cart_item(item_id, &updated) {
                self.rollback_reserve(&product_id, delta);
                return Err(e.into());
            }
            aggregate.items.insert(item_id.to_string(), updated.clone());
            self.touch_cart(&mut aggregate, user_id);
            Ok(updated)
        } else {
            let delta = current.quantity - quantity;
            self.reservation.release(&product_id, delta)?;

            let mut updated = current;
            updated.quantity = quantity;
            if let Err(e) = self.storage.persist_cart_item(item_id, &updated) {
                self.rollback_release(&product_id, delta);
                return Err(e.into());
            }
            aggregate.items.insert(item_id.to_string(), updated.clone());
            self.touch_cart(&mut aggregate, user_id);
            Ok(updated)
        }
    }

    /// Remove units from a cart line, releasing exactly what leaves
    ///
    /// `quantity` of `None` removes the whole line. Removing everything the
    /// line holds deletes it; removing part of it decrements it. Asking for
    /// more than the line holds is refused outright.
    pub fn remove_quantity(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: Option<u32>,
    ) -> CartResult<()> {
        let mut aggregate = self
            .carts
            .get_mut(user_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        let current = aggregate
            .items
            .get(item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?
            .clone();

        let held = current.quantity;
        let removing = quantity.unwrap_or(held);
        if removing == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if removing > held {
            return Err(CartError::RemovalExceedsHeld {
                requested: removing,
                held,
            });
        }

        // A vanished product has no counters left to release; the line is
        // still removed so the cart does not keep a ghost holding
        let released = match self.reservation.release(&current.product_id, removing) {
            Ok(_) => true,
            Err(ReservationError::NotFound(_)) => {
                tracing::warn!(
                    item_id,
                    product_id = %current.product_id,
                    "Product gone from stock ledger, dropping held units"
                );
                false
            }
            Err(e) => return Err(e.into()),
        };

        if removing == held {
            if let Err(e) = self.storage.remove_cart_item(item_id) {
                if released {
                    self.rollback_release(&current.product_id, removing);
                }
                return Err(e.into());
            }
            aggregate.items.remove(item_id);
        } else {
            let mut updated = current.clone();
            updated.quantity = held - removing;
            if let Err(e) = self.storage.persist_cart_item(item_id, &updated) {
                if released {
                    self.rollback_release(&current.product_id, removing);
                }
                return Err(e.into());
            }
            aggregate.items.insert(item_id.to_string(), updated);
        }

        self.touch_cart(&mut aggregate, user_id);
        Ok(())
    }

    /// Empty the user's cart, releasing every held unit
    ///
    /// Clearing is best-effort per line: a line whose release or delete
    /// fails stays in the cart, the rest are cleared. A line whose product
    /// has vanished from the ledger has nothing to release and is dropped.
    pub fn clear_cart(&self, user_id: &str) -> CartResult<()> {
        let Some(mut aggregate) = self.carts.get_mut(user_id) else {
            return Ok(());
        };

        let items: Vec<CartItem> = aggregate.items.values().cloned().collect();
        for item in items {
            let released = match self.reservation.release(&item.product_id, item.quantity) {
                Ok(_) => true,
                Err(ReservationError::NotFound(_)) => {
                    tracing::warn!(
                        item_id = %item.id,
                        product_id = %item.product_id,
                        "Product gone from stock ledger, dropping cart line"
                    );
                    false
                }
                Err(e) => {
                    tracing::error!(
                        item_id = %item.id,
                        product_id = %item.product_id,
                        error = %e,
                        "Failed to release stock while clearing cart"
                    );
                    continue;
                }
            };
            if let Err(e) = self.storage.remove_cart_item(&item.id) {
                if released {
                    self.rollback_release(&item.product_id, item.quantity);
                }
                tracing::error!(item_id = %item.id, error = %e, "Failed to delete cart item row");
                continue;
            }
            aggregate.items.remove(&item.id);
        }

        self.touch_cart(&mut aggregate, user_id);
        Ok(())
    }

    /// Current cart contents with live catalog data and price totals
    ///
    /// Reading never mutates. Items whose product has vanished from the
    /// catalog are returned without product data and priced at zero.
    pub fn summary(&self, user_id: &str, catalog: &ProductCatalog) -> CartSummary {
        let Some(aggregate) = self.carts.get(user_id) else {
            return CartSummary::empty(user_id);
        };

        let mut views: Vec<CartItemView> = Vec::with_capacity(aggregate.items.len());
        let mut total_items = 0u32;
        let mut total_price = rust_decimal::Decimal::ZERO;

        for item in aggregate.items.values() {
            let product = catalog.brief(&item.product_id);
            if let Some(brief) = &product {
                total_price += brief.price * rust_decimal::Decimal::from(item.quantity);
            }
            total_items += item.quantity;
            views.push(CartItemView {
                id: item.id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                added_at: item.added_at,
                product,
            });
        }
        views.sort_by(|a, b| a.added_at.cmp(&b.added_at));

        CartSummary {
            cart_id: aggregate.cart.id.clone(),
            user_id: user_id.to_string(),
            items: views,
            total_items,
            total_price,
        }
    }

    fn get_or_create_aggregate(
        &self,
        user_id: &str,
    ) -> CartResult<dashmap::mapref::one::RefMut<'_, String, CartAggregate>> {
        self.carts
            .entry(user_id.to_string())
            .or_try_insert_with(|| {
                let now = Utc::now();
                let cart = Cart {
                    id: Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                self.storage.persist_cart(user_id, &cart)?;
                Ok::<_, CartError>(CartAggregate {
                    cart,
                    items: HashMap::new(),
                })
            })
    }

    fn touch_cart(
        &self,
        aggregate: &mut dashmap::mapref::one::RefMut<'_, String, CartAggregate>,
        user_id: &str,
    ) {
        aggregate.cart.updated_at = Utc::now();
        if let Err(e) = self.storage.persist_cart(user_id, &aggregate.cart) {
            tracing::warn!(user_id, error = %e, "Failed to persist cart timestamp");
        }
    }

    fn rollback_reserve(&self, product_id: &str, quantity: u32) {
        if let Err(e) = self.reservation.release(product_id, quantity) {
            tracing::error!(
                product_id,
                quantity,
                error = %e,
                "Compensating release failed, counters may drift until next reconcile"
            );
        }
    }

    fn rollback_release(&self, product_id: &str, quantity: u32) {
        if let Err(e) = self.reservation.reserve(product_id, quantity) {
            tracing::error!(
                product_id,
                quantity,
                error = %e,
                "Compensating reserve failed, counters may drift until next reconcile"
            );
        }
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("carts", &self.carts.len())
            .finish()
    }
}
