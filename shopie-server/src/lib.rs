//! Shopie Server - inventory reservation backend
//!
//! # Architecture overview
//!
//! Stock moves through exactly one path: the reservation service reads a
//! versioned counter record from the stock ledger, computes the successor
//! state, and commits it with a compare-and-swap. Carts hold what they
//! reserved, the catalog composes counters into API views, and a periodic
//! checker verifies that counters balance and match cart holdings.
//!
//! # Module structure
//!
//! ```text
//! shopie-server/src/
//! ├── core/          # Config, state, server
//! ├── auth/          # Header-based request identity
//! ├── storage/       # Embedded redb persistence
//! ├── ledger/        # Versioned stock counters
//! ├── reservation/   # Reserve / release / adjust-total
//! ├── catalog/       # Product descriptive data
//! ├── cart/          # Per-user cart aggregates
//! ├── invariant/     # Consistency sweeps and startup repair
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # Logging, validation
//! ```

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod core;
pub mod invariant;
pub mod ledger;
pub mod reservation;
pub mod storage;
pub mod utils;

// Re-export public types
pub use auth::{Identity, Role};
pub use cart::CartManager;
pub use catalog::ProductCatalog;
pub use core::{Config, Server, ServerState};
pub use invariant::{InvariantChecker, InvariantReport};
pub use ledger::{StockCounters, StockLedger};
pub use reservation::ReservationService;
pub use storage::Storage;

// Re-export unified error types from shared
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, then initialize logging from LOG_LEVEL / LOG_DIR
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let level = std::env::var("LOG_LEVEL").ok();
    let dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(level.as_deref(), dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
   _____ __                _
  / ___// /_  ____  ____  (_)__
  \__ \/ __ \/ __ \/ __ \/ / _ \
 ___/ / / / / /_/ / /_/ / /  __/
/____/_/ /_/\____/ .___/_/\___/
                /_/
    "#
    );
}
