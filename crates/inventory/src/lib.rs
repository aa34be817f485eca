//! Inventory domain module.
//!
//! Business rules for warehouses, the kardex movement ledger, per-warehouse
//! stock levels and transfers, implemented as deterministic domain logic
//! (no IO, no HTTP, no storage). Every stock-affecting command is turned into
//! a *plan*: the exact records to append and the stock levels to write, each
//! guarded by the version it was computed from. Infra commits plans atomically.

pub mod command;
pub mod event;
pub mod movement;
pub mod stock;
pub mod transfer;
pub mod warehouse;

pub use command::{
    AdjustGlobalStock, ApplyMovement, CounterChange, GlobalStockPlan, MovementPlan, StockChange,
    TransferPlan, TransferStock,
};
pub use event::{GlobalStockAdjusted, InventoryEvent, WarehouseRemoved};
pub use movement::{EntradaReason, MovementDetails, MovementKind, MovementRecord, NewMovement, SalidaReason};
pub use stock::{ProductStockCounter, StockEntry, StockKey};
pub use transfer::{Transfer, TransferStatus};
pub use warehouse::{Warehouse, WarehouseDraft, WarehouseStatus};
