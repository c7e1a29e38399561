//! Reservation Service - the only writer of stock counters
//!
//! Every counter mutation goes through one of the three operations here:
//! reserve, release, adjust-total. Each operation follows the same shape:
//! read the current versioned record, compute the successor counters,
//! submit it through the ledger's compare-and-swap, and retry on a version
//! race. Validation failures are decided against a consistent snapshot and
//! returned without retrying.

use std::sync::Arc;

use shared::AppError;
use thiserror::Error;

use crate::ledger::{CasOutcome, LedgerError, StockCounters, StockLedger};
use crate::storage::StorageError;

/// Bounded retries for a version race before giving up
const MAX_COMMIT_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("product not found: {0}")]
    NotFound(String),

    #[error("stock entry already exists for product: {0}")]
    AlreadyExists(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("total {requested_total} would fall below reserved {reserved}")]
    InvalidAdjustment { requested_total: u32, reserved: u32 },

    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("too many concurrent updates for product: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<LedgerError> for ReservationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => ReservationError::NotFound(id),
            LedgerError::AlreadyExists(id) => ReservationError::AlreadyExists(id),
            LedgerError::Storage(e) => ReservationError::Storage(e),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::NotFound(id) => AppError::product_not_found(&id),
            ReservationError::AlreadyExists(id) => AppError::new(
                shared::ErrorCode::AlreadyExists,
            )
            .with_detail("product_id", id),
            ReservationError::InsufficientStock {
                requested,
                available,
            } => AppError::insufficient_stock(requested, available),
            ReservationError::InvalidAdjustment {
                requested_total,
                reserved,
            } => AppError::invalid_adjustment(requested_total, reserved),
            ReservationError::InvalidQuantity => {
                AppError::invalid_request("quantity must be positive")
            }
            ReservationError::Conflict(id) => AppError::concurrency_conflict(&id),
            ReservationError::Storage(e) => {
                AppError::new(shared::ErrorCode::StorageFailure).with_detail("cause", e.to_string())
            }
        }
    }
}

pub type ReservationResult<T> = Result<T, ReservationError>;

/// The counter mutation gateway over the stock ledger
pub struct ReservationService {
    ledger: Arc<StockLedger>,
}

impl ReservationService {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    /// Create the stock entry for a new product
    pub fn create_entry(&self, product_id: &str, total: u32) -> ReservationResult<StockCounters> {
        Ok(self.ledger.insert(product_id, total)?)
    }

    /// Drop a product's stock entry (product deletion)
    ///
    /// Returns the final counters so the caller can restore the entry if
    /// it has to back out of the deletion.
    pub fn remove_entry(&self, product_id: &str) -> ReservationResult<StockCounters> {
        Ok(self.ledger.remove(product_id)?)
    }

    /// Undo a removal by re-creating the entry with its final counters
    pub fn restore_entry(
        &self,
        product_id: &str,
        counters: StockCounters,
    ) -> ReservationResult<()> {
        Ok(self.ledger.restore(product_id, counters)?)
    }

    /// Current counters for a product
    pub fn counters(&self, product_id: &str) -> Option<StockCounters> {
        self.ledger.read(product_id).map(|r| r.counters)
    }

    /// Snapshot of all counters
    pub fn snapshot(&self) -> Vec<(String, StockCounters)> {
        self.ledger.snapshot()
    }

    /// Move `quantity` units from available to reserved
    ///
    /// Availability is checked against the same snapshot the commit is
    /// validated against, so a reservation can never overdraw even when
    /// racing other reservations of the same product.
    pub fn reserve(&self, product_id: &str, quantity: u32) -> ReservationResult<StockCounters> {
        if quantity == 0 {
            return Err(ReservationError::InvalidQuantity);
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let record = self
                .ledger
                .read(product_id)
                .ok_or_else(|| ReservationError::NotFound(product_id.to_string()))?;
            let current = record.counters;

            if quantity > current.available {
                return Err(ReservationError::InsufficientStock {
                    requested: quantity,
                    available: current.available,
                });
            }

            let next = StockCounters {
                total: current.total,
                available: current.available - quantity,
                reserved: current.reserved + quantity,
            };

            match self.ledger.compare_and_swap(product_id, record.version, next)? {
                CasOutcome::Committed(counters) => return Ok(counters),
                CasOutcome::VersionMismatch => continue,
            }
        }

        tracing::warn!(product_id, quantity, "Reserve abandoned after version races");
        Err(ReservationError::Conflict(product_id.to_string()))
    }

    /// Move `quantity` units from reserved back to available
    ///
    /// A release larger than the reserved counter clamps reserved at zero
    /// instead of underflowing. That is always a caller accounting bug, so
    /// it is logged loudly, but refusing the release would strand stock.
    pub fn release(&self, product_id: &str, quantity: u32) -> ReservationResult<StockCounters> {
        if quantity == 0 {
            return Err(ReservationError::InvalidQuantity);
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let record = self
                .ledger
                .read(product_id)
                .ok_or_else(|| ReservationError::NotFound(product_id.to_string()))?;
            let current = record.counters;

            if quantity > current.reserved {
                tracing::error!(
                    product_id,
                    quantity,
                    reserved = current.reserved,
                    "Release exceeds reserved stock, clamping at zero"
                );
            }
            let released = quantity.min(current.reserved);

            let next = StockCounters {
                total: current.total,
                available: current.available + released,
                reserved: current.reserved - released,
            };

            match self.ledger.compare_and_swap(product_id, record.version, next)? {
                CasOutcome::Committed(counters) => return Ok(counters),
                CasOutcome::VersionMismatch => continue,
            }
        }

        tracing::warn!(product_id, quantity, "Release abandoned after version races");
        Err(ReservationError::Conflict(product_id.to_string()))
    }

    /// Set a product's total stock, preserving current reservations
    ///
    /// The new total must cover everything currently reserved; available
    /// absorbs the whole difference.
    pub fn adjust_total(&self, product_id: &str, new_total: u32) -> ReservationResult<StockCounters> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let record = self
                .ledger
                .read(product_id)
                .ok_or_else(|| ReservationError::NotFound(product_id.to_string()))?;
            let current = record.counters;

            let available = new_total.checked_sub(current.reserved).ok_or(
                ReservationError::InvalidAdjustment {
                    requested_total: new_total,
                    reserved: current.reserved,
                },
            )?;

            let next = StockCounters {
                total: new_total,
                available,
                reserved: current.reserved,
            };

            match self.ledger.compare_and_swap(product_id, record.version, next)? {
                CasOutcome::Committed(counters) => return Ok(counters),
                CasOutcome::VersionMismatch => continue,
            }
        }

        tracing::warn!(product_id, new_total, "Adjust abandoned after version races");
        Err(ReservationError::Conflict(product_id.to_string()))
    }

    /// Overwrite a product's reserved counter from an authoritative sum
    ///
    /// Startup reconciliation: cart items are the source of truth for what
    /// is held, counters are rebuilt around them.
    pub fn reconcile_reserved(
        &self,
        product_id: &str,
        reserved: u32,
    ) -> ReservationResult<StockCounters> {
        let record = self
            .ledger
            .read(product_id)
            .ok_or_else(|| ReservationError::NotFound(product_id.to_string()))?;
        let total = record.counters.total.max(reserved);
        let counters = StockCounters {
            total,
            available: total - reserved,
            reserved,
        };
        if counters != record.counters {
            tracing::warn!(
                product_id,
                ?counters,
                previous = ?record.counters,
                "Reconciled stock counters from cart holdings"
            );
            self.ledger.force_set(product_id, counters)?;
        }
        Ok(counters)
    }
}

impl std::fmt::Debug for ReservationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationService")
            .field("ledger", &self.ledger)
            .finish()
    }
}
