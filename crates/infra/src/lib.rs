//! Infrastructure layer: storage, orchestration, reconciliation, config.

pub mod config;
pub mod ledger;
pub mod projection;
pub mod reconcile;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, RetryPolicy, Settings};
pub use ledger::MovementLedger;
pub use projection::{StockProjection, WarehouseStock};
pub use reconcile::{Divergence, RebuildReport, ReconciliationReport, ReplayedStock};
pub use service::{QualityApproval, Reservation, SaleLine, StockError, StockService, TransferOutcome};
pub use store::{
    CommitReceipt, EntryScope, InMemoryInventoryStore, InventoryStore, MovementFilter,
    PostgresInventoryStore, StockTransaction, StoreError, WarehouseDirectory,
};
