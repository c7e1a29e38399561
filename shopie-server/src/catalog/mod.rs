//! Product Catalog
//!
//! Descriptive product data lives here; the stock counters live in the
//! ledger and are composed into API views at read time. Creating a
//! product opens its stock entry, deleting it drops the entry, and a
//! total-stock edit routes through the reservation service so it can
//! never shrink below what carts currently hold.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{Product, ProductBrief, ProductCreate, ProductUpdate};
use shared::{AppError, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::cart::CartManager;
use crate::ledger::StockCounters;
use crate::reservation::{ReservationError, ReservationService};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(String),

    #[error("only the owner may modify this product")]
    NotOwner,

    #[error("admin role required")]
    AdminRequired,

    #[error("price must be positive")]
    InvalidPrice,

    #[error("product is held by {carts} cart(s)")]
    InUse { carts: usize },

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => AppError::product_not_found(&id),
            CatalogError::NotOwner => {
                AppError::permission_denied("only the owner may modify this product")
            }
            CatalogError::AdminRequired => AppError::new(ErrorCode::AdminRequired),
            CatalogError::InvalidPrice => AppError::new(ErrorCode::ProductInvalidPrice),
            CatalogError::InUse { carts } => {
                AppError::new(ErrorCode::ProductInUse).with_detail("carts", carts)
            }
            CatalogError::Reservation(e) => e.into(),
            CatalogError::Storage(e) => {
                AppError::new(ErrorCode::StorageFailure).with_detail("cause", e.to_string())
            }
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persisted descriptive fields of a product (counters live in the ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductRecord {
    id: String,
    name: String,
    description: String,
    price: Decimal,
    image: Option<String>,
    category: Option<String>,
    owner_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRecord {
    fn as_product(&self, counters: StockCounters) -> Product {
        Product {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            image: self.image.clone(),
            category: self.category.clone(),
            total_stock: counters.total,
            available_stock: counters.available,
            reserved_stock: counters.reserved,
            owner_id: self.owner_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct ProductCatalog {
    products: DashMap<String, ProductRecord>,
    reservation: Arc<ReservationService>,
    storage: Storage,
}

impl ProductCatalog {
    /// Rebuild the catalog from persisted rows
    pub fn load(storage: Storage, reservation: Arc<ReservationService>) -> CatalogResult<Self> {
        let products = DashMap::new();
        for (product_id, record) in storage.load_products::<ProductRecord>()? {
            products.insert(product_id, record);
        }
        let catalog = Self {
            products,
            reservation,
            storage,
        };
        tracing::info!(products = catalog.products.len(), "Product catalog loaded");
        Ok(catalog)
    }

    /// Create a product and open its stock entry
    pub fn create(&self, identity: &Identity, payload: ProductCreate) -> CatalogResult<Product> {
        if !identity.role.is_admin() {
            return Err(CatalogError::AdminRequired);
        }
        if payload.price <= Decimal::ZERO {
            return Err(CatalogError::InvalidPrice);
        }

        let now = Utc::now();
        let record = ProductRecord {
            id: Uuid::new_v4().to_string(),
            name: payload.name,
            description: payload.description,
            price: payload.price,
            image: payload.image,
            category: payload.category,
            owner_id: identity.user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let counters = self.reservation.create_entry(&record.id, payload.total_stock)?;
        if let Err(e) = self.storage.persist_product(&record.id, &record) {
            if let Err(cleanup) = self.reservation.remove_entry(&record.id) {
                tracing::error!(product_id = %record.id, error = %cleanup, "Failed to drop stock entry after aborted create");
            }
            return Err(e.into());
        }

        let product = record.as_product(counters);
        self.products.insert(record.id.clone(), record);
        tracing::info!(product_id = %product.id, total = counters.total, "Product created");
        Ok(product)
    }

    /// A single product with live counters
    pub fn get(&self, product_id: &str) -> CatalogResult<Product> {
        let record = self
            .products
            .get(product_id)
            .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
        Ok(record.as_product(self.counters_for(product_id)))
    }

    /// All products with live counters, newest first
    pub fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|record| record.as_product(self.counters_for(record.key())))
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    }

    /// Display fields for cart views
    pub fn brief(&self, product_id: &str) -> Option<ProductBrief> {
        let record = self.products.get(product_id)?;
        let counters = self.counters_for(product_id);
        Some(ProductBrief {
            id: record.id.clone(),
            name: record.name.clone(),
            price: record.price,
            image: record.image.clone(),
            available_stock: counters.available,
        })
    }

    /// Update a product's descriptive fields and, optionally, its total stock
    pub fn update(
        &self,
        identity: &Identity,
        product_id: &str,
        payload: ProductUpdate,
    ) -> CatalogResult<Product> {
        let mut record = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
        if record.owner_id != identity.user_id && !identity.role.is_admin() {
            return Err(CatalogError::NotOwner);
        }
        if let Some(price) = payload.price {
            if price <= Decimal::ZERO {
                return Err(CatalogError::InvalidPrice);
            }
        }

        // Counter change first: it can fail without touching the record
        let previous_total = self.counters_for(product_id).total;
        if let Some(new_total) = payload.total_stock {
            self.reservation.adjust_total(product_id, new_total)?;
        }

        let mut updated = record.clone();
        if let Some(name) = payload.name {
            updated.name = name;
        }
        if let Some(description) = payload.description {
            updated.description = description;
        }
        if let Some(price) = payload.price {
            updated.price = price;
        }
        if let Some(image) = payload.image {
            updated.image = Some(image);
        }
        if let Some(category) = payload.category {
            updated.category = Some(category);
        }
        updated.updated_at = Utc::now();

        if let Err(e) = self.storage.persist_product(product_id, &updated) {
            if payload.total_stock.is_some() {
                if let Err(undo) = self.reservation.adjust_total(product_id, previous_total) {
                    tracing::error!(product_id, error = %undo, "Failed to restore total after aborted update");
                }
            }
            return Err(e.into());
        }

        *record = updated;
        Ok(record.as_product(self.counters_for(product_id)))
    }

    /// Delete a product not held by any cart
    pub fn delete(
        &self,
        identity: &Identity,
        product_id: &str,
        carts: &CartManager,
    ) -> CatalogResult<()> {
        {
            let record = self
                .products
                .get(product_id)
                .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
            if record.owner_id != identity.user_id && !identity.role.is_admin() {
                return Err(CatalogError::NotOwner);
            }
        }

        // Drop the stock entry before checking holders: from here on a
        // concurrent reserve fails with NotFound instead of slipping in
        // behind the reference count. A reserve that committed earlier
        // still holds its cart guard until the line is written, so the
        // count below observes it and the entry is restored.
        let counters = self.reservation.remove_entry(product_id)?;
        let holders = carts.product_reference_count(product_id);
        if holders > 0 {
            if let Err(e) = self.reservation.restore_entry(product_id, counters) {
                tracing::error!(product_id, error = %e, "Failed to restore stock entry for held product");
            }
            return Err(CatalogError::InUse { carts: holders });
        }

        self.storage.remove_product(product_id)?;
        self.products.remove(product_id);
        tracing::info!(product_id, "Product deleted");
        Ok(())
    }

    fn counters_for(&self, product_id: &str) -> StockCounters {
        match self.reservation.counters(product_id) {
            Some(counters) => counters,
            None => {
                tracing::error!(product_id, "Product has no stock entry");
                StockCounters::fresh(0)
            }
        }
    }
}

impl std::fmt::Debug for ProductCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCatalog")
            .field("products", &self.products.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::ledger::StockLedger;
    use rust_decimal::prelude::FromPrimitive;

    fn setup() -> (
        tempfile::TempDir,
        Arc<ReservationService>,
        ProductCatalog,
        CartManager,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("shop.redb")).unwrap();
        let ledger = Arc::new(StockLedger::load(storage.clone()).unwrap());
        let reservation = Arc::new(ReservationService::new(ledger));
        let catalog = ProductCatalog::load(storage.clone(), Arc::clone(&reservation)).unwrap();
        let carts = CartManager::load(storage, Arc::clone(&reservation)).unwrap();
        (dir, reservation, catalog, carts)
    }

    fn admin() -> Identity {
        Identity::new("admin-1", Role::Admin)
    }

    fn payload(name: &str, price: f64, total: u32) -> ProductCreate {
        ProductCreate {
            name: name.to_string(),
            description: String::new(),
            price: Decimal::from_f64(price).unwrap(),
            image: None,
            category: None,
            total_stock: total,
        }
    }

    #[test]
    fn test_create_opens_stock_entry() {
        let (_dir, reservation, catalog, _carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 20)).unwrap();

        assert_eq!(product.total_stock, 20);
        assert_eq!(product.available_stock, 20);
        assert_eq!(product.reserved_stock, 0);
        assert_eq!(reservation.counters(&product.id).unwrap().total, 20);
    }

    #[test]
    fn test_create_requires_admin() {
        let (_dir, _reservation, catalog, _carts) = setup();
        let customer = Identity::new("u1", Role::Customer);
        assert!(matches!(
            catalog.create(&customer, payload("Widget", 9.99, 20)),
            Err(CatalogError::AdminRequired)
        ));
    }

    #[test]
    fn test_create_rejects_nonpositive_price() {
        let (_dir, _reservation, catalog, _carts) = setup();
        assert!(matches!(
            catalog.create(&admin(), payload("Free", 0.0, 5)),
            Err(CatalogError::InvalidPrice)
        ));
    }

    #[test]
    fn test_get_composes_live_counters() {
        let (_dir, reservation, catalog, _carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 10)).unwrap();
        reservation.reserve(&product.id, 4).unwrap();

        let fetched = catalog.get(&product.id).unwrap();
        assert_eq!(fetched.available_stock, 6);
        assert_eq!(fetched.reserved_stock, 4);
    }

    #[test]
    fn test_update_total_routes_through_adjustment() {
        let (_dir, reservation, catalog, _carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 10)).unwrap();
        reservation.reserve(&product.id, 4).unwrap();

        let update = ProductUpdate {
            name: None,
            description: None,
            price: None,
            image: None,
            category: None,
            total_stock: Some(6),
        };
        let updated = catalog.update(&admin(), &product.id, update).unwrap();
        assert_eq!(updated.total_stock, 6);
        assert_eq!(updated.reserved_stock, 4);
        assert_eq!(updated.available_stock, 2);

        let too_small = ProductUpdate {
            name: None,
            description: None,
            price: None,
            image: None,
            category: None,
            total_stock: Some(3),
        };
        assert!(matches!(
            catalog.update(&admin(), &product.id, too_small),
            Err(CatalogError::Reservation(
                ReservationError::InvalidAdjustment { .. }
            ))
        ));
    }

    #[test]
    fn test_update_refused_for_non_owner() {
        let (_dir, _reservation, catalog, _carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 10)).unwrap();

        let other = Identity::new("u2", Role::Customer);
        let update = ProductUpdate {
            name: Some("Hijacked".to_string()),
            description: None,
            price: None,
            image: None,
            category: None,
            total_stock: None,
        };
        assert!(matches!(
            catalog.update(&other, &product.id, update),
            Err(CatalogError::NotOwner)
        ));
    }

    #[test]
    fn test_delete_blocked_while_held() {
        let (_dir, _reservation, catalog, carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 10)).unwrap();
        carts.add_item("alice", &product.id, 2).unwrap();

        assert!(matches!(
            catalog.delete(&admin(), &product.id, &carts),
            Err(CatalogError::InUse { carts: 1 })
        ));

        // The refused delete restored the stock entry as it was
        let counters = catalog.get(&product.id).unwrap();
        assert_eq!(counters.available_stock, 8);
        assert_eq!(counters.reserved_stock, 2);
        carts.add_item("alice", &product.id, 1).unwrap();
        assert_eq!(catalog.get(&product.id).unwrap().reserved_stock, 3);

        // Once the cart lets go the delete proceeds
        carts.clear_cart("alice").unwrap();
        catalog.delete(&admin(), &product.id, &carts).unwrap();
        assert!(matches!(
            catalog.get(&product.id),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_products_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.redb");
        let product_id;
        {
            let storage = Storage::open(&path).unwrap();
            let ledger = Arc::new(StockLedger::load(storage.clone()).unwrap());
            let reservation = Arc::new(ReservationService::new(ledger));
            let catalog = ProductCatalog::load(storage, reservation).unwrap();
            product_id = catalog
                .create(&admin(), payload("Widget", 9.99, 10))
                .unwrap()
                .id;
        }

        let storage = Storage::open(&path).unwrap();
        let ledger = Arc::new(StockLedger::load(storage.clone()).unwrap());
        let reservation = Arc::new(ReservationService::new(ledger));
        let catalog = ProductCatalog::load(storage, reservation).unwrap();
        let product = catalog.get(&product_id).unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.total_stock, 10);
    }

    #[test]
    fn test_brief() {
        let (_dir, reservation, catalog, _carts) = setup();
        let product = catalog.create(&admin(), payload("Widget", 9.99, 10)).unwrap();
        reservation.reserve(&product.id, 3).unwrap();

        let brief = catalog.brief(&product.id).unwrap();
        assert_eq!(brief.name, "Widget");
        assert_eq!(brief.available_stock, 7);
        assert!(catalog.brief("ghost").is_none());
    }
}
