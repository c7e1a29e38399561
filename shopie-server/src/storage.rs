//! redb-based persistence layer
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `stock_counters` | `product_id` | `StockRecord` | Versioned stock counters |
//! | `products` | `product_id` | `ProductRecord` | Catalog descriptive data |
//! | `carts` | `user_id` | `Cart` | Cart rows (one per user) |
//! | `cart_items` | `item_id` | `CartItem` | Cart line items |
//!
//! # Durability
//!
//! redb uses `Durability::Immediate` by default, which ensures:
//! - Commits are persistent as soon as `commit()` returns
//! - Uses copy-on-write with atomic pointer swap (safe against power loss)
//! - Database file always in consistent state
//!
//! Every counter commit and cart-item mutation is written through before the
//! in-memory state is published, so a restart recovers the last committed
//! rest point.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for stock counters: key = product_id, value = JSON-serialized StockRecord
const COUNTERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("stock_counters");

/// Table for catalog data: key = product_id, value = JSON-serialized ProductRecord
const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

/// Table for cart rows: key = user_id, value = JSON-serialized Cart
const CARTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("carts");

/// Table for cart line items: key = item_id, value = JSON-serialized CartItem
const CART_ITEMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cart_items");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store shared by the ledger, catalog and cart manager
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;

        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(CARTS_TABLE)?;
            let _ = write_txn.open_table(CART_ITEMS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ==================== Generic table helpers ====================

    fn put<T: Serialize>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(table)?;
            t.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, table: TableDefinition<&str, &[u8]>, key: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(table)?;
            t.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load_all<T: DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
    ) -> StorageResult<Vec<(String, T)>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table)?;
        let mut out = Vec::new();
        for entry in t.iter()? {
            let (key, value) = entry?;
            let parsed: T = serde_json::from_slice(value.value())?;
            out.push((key.value().to_string(), parsed));
        }
        Ok(out)
    }

    // ==================== Stock counters ====================

    pub fn persist_counters<T: Serialize>(&self, product_id: &str, record: &T) -> StorageResult<()> {
        self.put(COUNTERS_TABLE, product_id, record)
    }

    pub fn remove_counters(&self, product_id: &str) -> StorageResult<()> {
        self.delete(COUNTERS_TABLE, product_id)
    }

    pub fn load_counters<T: DeserializeOwned>(&self) -> StorageResult<Vec<(String, T)>> {
        self.load_all(COUNTERS_TABLE)
    }

    // ==================== Catalog ====================

    pub fn persist_product<T: Serialize>(&self, product_id: &str, record: &T) -> StorageResult<()> {
        self.put(PRODUCTS_TABLE, product_id, record)
    }

    pub fn remove_product(&self, product_id: &str) -> StorageResult<()> {
        self.delete(PRODUCTS_TABLE, product_id)
    }

    pub fn load_products<T: DeserializeOwned>(&self) -> StorageResult<Vec<(String, T)>> {
        self.load_all(PRODUCTS_TABLE)
    }

    // ==================== Carts ====================

    pub fn persist_cart<T: Serialize>(&self, user_id: &str, cart: &T) -> StorageResult<()> {
        self.put(CARTS_TABLE, user_id, cart)
    }

    pub fn load_carts<T: DeserializeOwned>(&self) -> StorageResult<Vec<(String, T)>> {
        self.load_all(CARTS_TABLE)
    }

    pub fn persist_cart_item<T: Serialize>(&self, item_id: &str, item: &T) -> StorageResult<()> {
        self.put(CART_ITEMS_TABLE, item_id, item)
    }

    pub fn remove_cart_item(&self, item_id: &str) -> StorageResult<()> {
        self.delete(CART_ITEMS_TABLE, item_id)
    }

    pub fn load_cart_items<T: DeserializeOwned>(&self) -> StorageResult<Vec<(String, T)>> {
        self.load_all(CART_ITEMS_TABLE)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    fn scratch() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("test.redb")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_put_and_reload() {
        let (_dir, storage) = scratch();
        storage.persist_counters("p1", &Row { n: 7 }).unwrap();
        storage.persist_counters("p2", &Row { n: 9 }).unwrap();

        let mut rows: Vec<(String, Row)> = storage.load_counters().unwrap();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(rows, vec![("p1".into(), Row { n: 7 }), ("p2".into(), Row { n: 9 })]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, storage) = scratch();
        storage.persist_cart_item("i1", &Row { n: 1 }).unwrap();
        storage.remove_cart_item("i1").unwrap();
        storage.remove_cart_item("i1").unwrap();
        let rows: Vec<(String, Row)> = storage.load_cart_items().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let storage = Storage::open(&path).unwrap();
            storage.persist_product("p1", &Row { n: 3 }).unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        let rows: Vec<(String, Row)> = storage.load_products().unwrap();
        assert_eq!(rows, vec![("p1".into(), Row { n: 3 })]);
    }

    #[test]
    fn test_tables_are_isolated() {
        let (_dir, storage) = scratch();
        storage.persist_counters("x", &Row { n: 1 }).unwrap();
        let rows: Vec<(String, Row)> = storage.load_products().unwrap();
        assert!(rows.is_empty());
    }
}
