//! Stock Ledger - versioned per-product stock counters
//!
//! The ledger is the single authority for the three counters of every
//! product. Runtime state lives in a sharded map of version-stamped
//! records; every committed record is written through to redb before it
//! becomes visible, so counters recover to the last committed rest point
//! after a restart.
//!
//! # Commit protocol
//!
//! Callers never mutate a record in place. They read a snapshot, compute
//! the successor counters, and submit them through [`StockLedger::compare_and_swap`]
//! together with the version they read. The swap is applied only while the
//! stored version still matches; otherwise the caller re-reads and
//! recomputes. Two mutations of the same product can therefore never
//! interleave partially, and mutations of different products never contend.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Storage, StorageError};

/// The three per-product counters
///
/// Non-negativity is structural (`u32`); the rest-point invariant is
/// `total == available + reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounters {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
}

impl StockCounters {
    /// Initial counters for a freshly created product
    pub fn fresh(total: u32) -> Self {
        Self {
            total,
            available: total,
            reserved: 0,
        }
    }

    /// Whether the counter identity `total == available + reserved` holds
    pub fn is_balanced(&self) -> bool {
        self.total as u64 == self.available as u64 + self.reserved as u64
    }
}

/// A version-stamped counter record as stored in the arena and on disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockRecord {
    pub counters: StockCounters,
    pub version: u64,
}

/// Result of a compare-and-swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The swap was applied and persisted
    Committed(StockCounters),
    /// The stored version no longer matches; re-read and retry
    VersionMismatch,
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no ledger entry for product: {0}")]
    NotFound(String),

    #[error("ledger entry already exists for product: {0}")]
    AlreadyExists(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable per-product stock counters with an atomic update primitive
pub struct StockLedger {
    records: DashMap<String, StockRecord>,
    storage: Storage,
}

impl StockLedger {
    /// Load all persisted counter records into the arena
    pub fn load(storage: Storage) -> LedgerResult<Self> {
        let records = DashMap::new();
        for (product_id, record) in storage.load_counters::<StockRecord>()? {
            records.insert(product_id, record);
        }
        let ledger = Self { records, storage };
        tracing::info!(entries = ledger.records.len(), "Stock ledger loaded");
        Ok(ledger)
    }

    /// Number of tracked products
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create the counter record for a new product
    pub fn insert(&self, product_id: &str, total: u32) -> LedgerResult<StockCounters> {
        match self.records.entry(product_id.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyExists(product_id.to_string())),
            Entry::Vacant(slot) => {
                let record = StockRecord {
                    counters: StockCounters::fresh(total),
                    version: 0,
                };
                self.storage.persist_counters(product_id, &record)?;
                slot.insert(record);
                Ok(record.counters)
            }
        }
    }

    /// Remove a product's counter record, returning its final counters
    ///
    /// Once the record is gone, every in-flight compare-and-swap on the
    /// product fails with `NotFound`; [`StockLedger::restore`] undoes the
    /// removal when the caller finds it must back out.
    pub fn remove(&self, product_id: &str) -> LedgerResult<StockCounters> {
        let (_, record) = self
            .records
            .remove(product_id)
            .ok_or_else(|| LedgerError::NotFound(product_id.to_string()))?;
        self.storage.remove_counters(product_id)?;
        Ok(record.counters)
    }

    /// Re-create a removed counter record with known counters
    pub fn restore(&self, product_id: &str, counters: StockCounters) -> LedgerResult<()> {
        match self.records.entry(product_id.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyExists(product_id.to_string())),
            Entry::Vacant(slot) => {
                let record = StockRecord {
                    counters,
                    version: 0,
                };
                self.storage.persist_counters(product_id, &record)?;
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Read the current record for a product
    pub fn read(&self, product_id: &str) -> Option<StockRecord> {
        self.records.get(product_id).map(|r| *r)
    }

    /// Atomically replace a product's counters if the version still matches
    ///
    /// The new record is persisted while the entry guard is held and before
    /// the in-memory record is replaced: a storage failure leaves the
    /// published state untouched, and per-product persist order follows
    /// commit order.
    pub fn compare_and_swap(
        &self,
        product_id: &str,
        expected_version: u64,
        next: StockCounters,
    ) -> LedgerResult<CasOutcome> {
        let mut entry = self
            .records
            .get_mut(product_id)
            .ok_or_else(|| LedgerError::NotFound(product_id.to_string()))?;

        if entry.version != expected_version {
            return Ok(CasOutcome::VersionMismatch);
        }

        let record = StockRecord {
            counters: next,
            version: entry.version + 1,
        };
        self.storage.persist_counters(product_id, &record)?;
        *entry = record;
        Ok(CasOutcome::Committed(next))
    }

    /// Overwrite a product's counters unconditionally (startup reconciliation)
    pub fn force_set(&self, product_id: &str, counters: StockCounters) -> LedgerResult<()> {
        let mut entry = self
            .records
            .get_mut(product_id)
            .ok_or_else(|| LedgerError::NotFound(product_id.to_string()))?;
        let record = StockRecord {
            counters,
            version: entry.version + 1,
        };
        self.storage.persist_counters(product_id, &record)?;
        *entry = record;
        Ok(())
    }

    /// Snapshot of all counters (diagnostics, invariant checks)
    pub fn snapshot(&self) -> Vec<(String, StockCounters)> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().counters))
            .collect()
    }
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("entries", &self.records.len())
            .finish()
    }
}
