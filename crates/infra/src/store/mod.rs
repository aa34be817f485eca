//! Storage boundary for stock levels, the kardex ledger and warehouses.
//!
//! The traits are synchronous and make no storage assumptions; the in-memory
//! store backs tests and local runs, the Postgres store backs deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{
    CommitReceipt, EntryScope, InventoryStore, MovementFilter, StockTransaction, StoreError,
    WarehouseDirectory,
};
