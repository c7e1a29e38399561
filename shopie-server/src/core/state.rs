use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::cart::CartManager;
use crate::catalog::ProductCatalog;
use crate::core::Config;
use crate::invariant::InvariantChecker;
use crate::ledger::StockLedger;
use crate::reservation::ReservationService;
use crate::storage::Storage;

/// Shared handles to every service, cloned into each request
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Immutable configuration |
/// | reservation | Stock counter mutation gateway |
/// | catalog | Product descriptive data |
/// | carts | Per-user cart aggregates |
/// | invariants | Periodic consistency checker |
/// | shutdown | Cancellation for background tasks |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub reservation: Arc<ReservationService>,
    pub catalog: Arc<ProductCatalog>,
    pub carts: Arc<CartManager>,
    pub invariants: Arc<InvariantChecker>,
    pub shutdown: CancellationToken,
}

impl ServerState {
    /// Open the database and bring every service up
    ///
    /// Order matters: counters load first, then the catalog and carts that
    /// reference them, then the reconcile pass that rebuilds reserved
    /// counters from what carts actually hold.
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .with_context(|| format!("failed to create work dir: {}", config.work_dir))?;

        let storage = Storage::open(config.database_path())
            .with_context(|| format!("failed to open database at {:?}", config.database_path()))?;

        let ledger = Arc::new(StockLedger::load(storage.clone()).context("failed to load stock ledger")?);
        let reservation = Arc::new(ReservationService::new(ledger));
        let catalog = Arc::new(
            ProductCatalog::load(storage.clone(), Arc::clone(&reservation))
                .context("failed to load product catalog")?,
        );
        let carts = Arc::new(
            CartManager::load(storage, Arc::clone(&reservation))
                .context("failed to load cart aggregates")?,
        );

        let invariants = Arc::new(InvariantChecker::new(
            Arc::clone(&reservation),
            Arc::clone(&carts),
        ));
        invariants
            .reconcile()
            .context("failed to reconcile stock counters")?;

        Ok(Self {
            config: config.clone(),
            reservation,
            catalog,
            carts,
            invariants,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn background tasks (invariant sweep)
    pub fn start_background_tasks(&self) {
        let interval = Duration::from_millis(self.config.invariant_sweep_ms);
        tokio::spawn(
            Arc::clone(&self.invariants).run_sweep(interval, self.shutdown.clone()),
        );
    }
}
