//! Invariant checker
//!
//! Two identities must hold at every rest point:
//! counters balance (`total == available + reserved`) and the reserved
//! counter of every product equals the summed quantity held across carts.
//! A periodic sweep verifies both, logs any violation, and keeps the last
//! report for the diagnostics endpoint. At startup the same data repairs
//! drifted counters, with cart holdings as the source of truth.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cart::CartManager;
use crate::reservation::{ReservationResult, ReservationService};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// `total != available + reserved` for a product
    CounterMismatch {
        product_id: String,
        total: u32,
        available: u32,
        reserved: u32,
    },
    /// Reserved counter disagrees with what carts actually hold
    ReservationMismatch {
        product_id: String,
        reserved: u32,
        cart_sum: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct InvariantReport {
    pub checked_products: usize,
    pub violations: Vec<Violation>,
    pub checked_at: DateTime<Utc>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct InvariantChecker {
    reservation: Arc<ReservationService>,
    carts: Arc<CartManager>,
    last_report: RwLock<Option<InvariantReport>>,
}

impl InvariantChecker {
    pub fn new(reservation: Arc<ReservationService>, carts: Arc<CartManager>) -> Self {
        Self {
            reservation,
            carts,
            last_report: RwLock::new(None),
        }
    }

    /// Verify both identities across all products
    pub fn check_all(&self) -> InvariantReport {
        let counters = self.reservation.snapshot();
        let mut holdings = self.carts.reserved_by_product();
        let mut violations = Vec::new();

        for (product_id, stock) in &counters {
            if !stock.is_balanced() {
                violations.push(Violation::CounterMismatch {
                    product_id: product_id.clone(),
                    total: stock.total,
                    available: stock.available,
                    reserved: stock.reserved,
                });
            }
            let cart_sum = holdings.remove(product_id).unwrap_or(0);
            if stock.reserved != cart_sum {
                violations.push(Violation::ReservationMismatch {
                    product_id: product_id.clone(),
                    reserved: stock.reserved,
                    cart_sum,
                });
            }
        }

        // Cart items pointing at products the ledger no longer tracks
        for (product_id, cart_sum) in holdings {
            violations.push(Violation::ReservationMismatch {
                product_id,
                reserved: 0,
                cart_sum,
            });
        }

        for violation in &violations {
            tracing::error!(?violation, "Stock invariant violated");
        }

        let report = InvariantReport {
            checked_products: counters.len(),
            violations,
            checked_at: Utc::now(),
        };
        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Most recent sweep result, if any sweep has run
    pub fn last_report(&self) -> Option<InvariantReport> {
        self.last_report.read().clone()
    }

    /// Rebuild reserved counters from cart holdings (startup repair)
    pub fn reconcile(&self) -> ReservationResult<()> {
        let holdings = self.carts.reserved_by_product();
        for (product_id, _) in self.reservation.snapshot() {
            let reserved = holdings.get(&product_id).copied().unwrap_or(0);
            self.reservation.reconcile_reserved(&product_id, reserved)?;
        }
        Ok(())
    }

    /// Periodic sweep until cancelled
    pub async fn run_sweep(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Invariant sweep started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Invariant sweep stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    let report = self.check_all();
                    if report.is_clean() {
                        tracing::debug!(products = report.checked_products, "Invariant sweep clean");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for InvariantChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantChecker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{StockCounters, StockLedger};
    use crate::storage::Storage;

    fn setup() -> (
        tempfile::TempDir,
        Arc<ReservationService>,
        Arc<CartManager>,
        InvariantChecker,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("shop.redb")).unwrap();
        let ledger = Arc::new(StockLedger::load(storage.clone()).unwrap());
        let reservation = Arc::new(ReservationService::new(ledger));
        let carts = Arc::new(CartManager::load(storage, Arc::clone(&reservation)).unwrap());
        let checker = InvariantChecker::new(Arc::clone(&reservation), Arc::clone(&carts));
        (dir, reservation, carts, checker)
    }

    #[test]
    fn test_clean_state_reports_no_violations() {
        let (_dir, reservation, carts, checker) = setup();
        reservation.create_entry("p1", 10).unwrap();
        carts.add_item("alice", "p1", 3).unwrap();

        let report = checker.check_all();
        assert!(report.is_clean());
        assert_eq!(report.checked_products, 1);
        assert_eq!(checker.last_report().unwrap().checked_products, 1);
    }

    #[test]
    fn test_detects_reservation_drift() {
        let (_dir, reservation, _carts, checker) = setup();
        reservation.create_entry("p1", 10).unwrap();
        // Reserved with no cart holding it
        reservation.reserve("p1", 4).unwrap();

        let report = checker.check_all();
        assert_eq!(
            report.violations,
            vec![Violation::ReservationMismatch {
                product_id: "p1".to_string(),
                reserved: 4,
                cart_sum: 0,
            }]
        );
    }

    #[test]
    fn test_reconcile_rebuilds_reserved_from_carts() {
        let (_dir, reservation, carts, checker) = setup();
        reservation.create_entry("p1", 10).unwrap();
        carts.add_item("alice", "p1", 3).unwrap();
        // Simulate drift left by a crash between reserve and cart persist
        reservation.reserve("p1", 5).unwrap();
        assert!(!checker.check_all().is_clean());

        checker.reconcile().unwrap();
        let counters = reservation.counters("p1").unwrap();
        assert_eq!(
            counters,
            StockCounters {
                total: 10,
                available: 7,
                reserved: 3,
            }
        );
        assert!(checker.check_all().is_clean());
    }

    #[tokio::test]
    async fn test_sweep_stops_on_cancel() {
        let (_dir, _reservation, _carts, checker) = setup();
        let checker = Arc::new(checker);
        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&checker).run_sweep(
            Duration::from_millis(5),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(25)).await;
        token.cancel();
        handle.await.unwrap();
        assert!(checker.last_report().is_some());
    }
}
