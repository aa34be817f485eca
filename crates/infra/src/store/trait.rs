use std::sync::Arc;

use thiserror::Error;

use kardex_core::{ProductId, TransferId, WarehouseId};
use kardex_inventory::{
    CounterChange, GlobalStockPlan, MovementKind, MovementPlan, MovementRecord, NewMovement,
    ProductStockCounter, StockChange, StockEntry, StockKey, Transfer, TransferPlan, Warehouse,
};

/// Everything one stock operation writes, committed as a single unit.
///
/// ## Commit Semantics
///
/// `InventoryStore::commit()`:
/// - checks every stock / counter change against the version it was planned from
/// - writes the new quantities (version + 1)
/// - appends the movements, assigning ledger sequence numbers in staging order
/// - stores the transfer record, if any
///
/// A single mismatch aborts the whole transaction with `StoreError::Concurrency`
/// and nothing is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockTransaction {
    pub stock: Vec<StockChange>,
    pub counters: Vec<CounterChange>,
    pub movements: Vec<NewMovement>,
    pub transfer: Option<Transfer>,
}

impl StockTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
            && self.counters.is_empty()
            && self.movements.is_empty()
            && self.transfer.is_none()
    }
}

impl From<MovementPlan> for StockTransaction {
    fn from(plan: MovementPlan) -> Self {
        Self {
            stock: vec![plan.change],
            movements: vec![plan.movement],
            ..Self::default()
        }
    }
}

impl From<TransferPlan> for StockTransaction {
    fn from(plan: TransferPlan) -> Self {
        Self {
            stock: vec![plan.source, plan.destination],
            counters: vec![],
            movements: vec![plan.outbound, plan.inbound],
            transfer: Some(plan.transfer),
        }
    }
}

impl From<GlobalStockPlan> for StockTransaction {
    fn from(plan: GlobalStockPlan) -> Self {
        Self {
            counters: vec![plan.change],
            ..Self::default()
        }
    }
}

/// What a successful commit wrote, in staging order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub entries: Vec<StockEntry>,
    pub counters: Vec<ProductStockCounter>,
    pub movements: Vec<MovementRecord>,
    pub transfer: Option<Transfer>,
}

/// Which stock entries to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryScope {
    All,
    Product(ProductId),
    Warehouse(WarehouseId),
}

impl EntryScope {
    pub fn includes(&self, entry: &StockEntry) -> bool {
        match self {
            EntryScope::All => true,
            EntryScope::Product(p) => &entry.product_id == p,
            EntryScope::Warehouse(w) => &entry.warehouse_id == w,
        }
    }
}

/// Kardex query. Every field is optional; results come back in ledger order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub kind: Option<MovementKind>,
    pub transfer_id: Option<TransferId>,
    /// Exact reason, ignoring case and surrounding whitespace.
    pub reason: Option<String>,
    /// Case-insensitive match over reason, reference, lot and serial.
    pub search: Option<String>,
}

impl MovementFilter {
    pub fn for_key(key: &StockKey) -> Self {
        Self {
            product_id: Some(key.product_id.clone()),
            warehouse_id: Some(key.warehouse_id.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &MovementRecord) -> bool {
        self.product_id.as_ref().is_none_or(|p| &record.product_id == p)
            && self.warehouse_id.as_ref().is_none_or(|w| &record.warehouse_id == w)
            && self.kind.is_none_or(|k| record.kind == k)
            && self.transfer_id.is_none_or(|t| record.transfer_id == Some(t))
            && self.reason.as_deref().is_none_or(|r| same_reason(&record.reason, r))
            && self.search.as_deref().is_none_or(|s| record.matches_search(s))
    }
}

fn same_reason(recorded: &str, wanted: &str) -> bool {
    recorded.trim().to_lowercase() == wanted.trim().to_lowercase()
}

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// insufficient stock), which never reach the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A planned version no longer matches the stored one.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate key on insert.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database, pool, or lock failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The stock ledger and its projection, behind one transactional boundary.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - apply `commit()` atomically (all writes or none)
/// - reject a change whose expected version differs from the stored one
/// - assign strictly increasing sequence numbers to movements
/// - never update or delete a committed movement
pub trait InventoryStore: Send + Sync {
    /// Current entry for a key; an empty entry at version 0 if none was written.
    fn load_entry(&self, key: &StockKey) -> Result<StockEntry, StoreError>;

    /// Stored entries in key order.
    fn entries(&self, scope: &EntryScope) -> Result<Vec<StockEntry>, StoreError>;

    fn commit(&self, transaction: StockTransaction) -> Result<CommitReceipt, StoreError>;

    /// Movements matching `filter`, in ledger order.
    fn movements(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StoreError>;

    /// Transfers in creation order.
    fn transfers(&self) -> Result<Vec<Transfer>, StoreError>;

    /// Product-wide counter; empty at version 0 if never written.
    fn load_counter(&self, product_id: &ProductId) -> Result<ProductStockCounter, StoreError>;
}

/// Warehouse descriptors.
pub trait WarehouseDirectory: Send + Sync {
    fn get_warehouse(&self, id: &WarehouseId) -> Result<Option<Warehouse>, StoreError>;

    /// All warehouses ordered by id.
    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError>;

    /// `StoreError::Conflict` if the id is taken.
    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    /// `StoreError::NotFound` if the id is unknown.
    fn update_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    /// `StoreError::NotFound` if the id is unknown.
    fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn load_entry(&self, key: &StockKey) -> Result<StockEntry, StoreError> {
        (**self).load_entry(key)
    }

    fn entries(&self, scope: &EntryScope) -> Result<Vec<StockEntry>, StoreError> {
        (**self).entries(scope)
    }

    fn commit(&self, transaction: StockTransaction) -> Result<CommitReceipt, StoreError> {
        (**self).commit(transaction)
    }

    fn movements(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).movements(filter)
    }

    fn transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        (**self).transfers()
    }

    fn load_counter(&self, product_id: &ProductId) -> Result<ProductStockCounter, StoreError> {
        (**self).load_counter(product_id)
    }
}

impl<S> WarehouseDirectory for Arc<S>
where
    S: WarehouseDirectory + ?Sized,
{
    fn get_warehouse(&self, id: &WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        (**self).get_warehouse(id)
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        (**self).list_warehouses()
    }

    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).insert_warehouse(warehouse)
    }

    fn update_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).update_warehouse(warehouse)
    }

    fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StoreError> {
        (**self).remove_warehouse(id)
    }
}
