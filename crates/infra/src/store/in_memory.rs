use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use kardex_core::{ExpectedVersion, ProductId, WarehouseId};
use kardex_inventory::{MovementRecord, ProductStockCounter, StockEntry, StockKey, Transfer, Warehouse};

use super::r#trait::{
    CommitReceipt, EntryScope, InventoryStore, MovementFilter, StockTransaction, StoreError,
    WarehouseDirectory,
};

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<StockKey, StockEntry>,
    counters: HashMap<ProductId, ProductStockCounter>,
    ledger: Vec<MovementRecord>,
    transfers: Vec<Transfer>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
}

impl State {
    fn entry(&self, key: &StockKey) -> StockEntry {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| StockEntry::empty(key.clone()))
    }

    fn counter(&self, product_id: &ProductId) -> ProductStockCounter {
        self.counters
            .get(product_id)
            .cloned()
            .unwrap_or_else(|| ProductStockCounter::empty(product_id.clone()))
    }

    fn next_sequence(&self) -> u64 {
        self.ledger.last().map(|m| m.sequence).unwrap_or(0) + 1
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Every commit runs under one write guard, which makes
/// the version checks and the writes a single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn load_entry(&self, key: &StockKey) -> Result<StockEntry, StoreError> {
        Ok(self.read()?.entry(key))
    }

    fn entries(&self, scope: &EntryScope) -> Result<Vec<StockEntry>, StoreError> {
        let state = self.read()?;
        Ok(state
            .entries
            .values()
            .filter(|e| scope.includes(e))
            .cloned()
            .collect())
    }

    fn commit(&self, transaction: StockTransaction) -> Result<CommitReceipt, StoreError> {
        if transaction.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut state = self.write()?;

        // Check every expectation before touching anything.
        for change in &transaction.stock {
            let current = state.entry(&change.key).version;
            ExpectedVersion::Exact(change.expected_version)
                .check(current)
                .map_err(|e| StoreError::Concurrency(format!("{}: {e}", change.key.stream())))?;
        }
        for change in &transaction.counters {
            let current = state.counter(&change.product_id).version;
            ExpectedVersion::Exact(change.expected_version)
                .check(current)
                .map_err(|e| StoreError::Concurrency(format!("product/{}: {e}", change.product_id)))?;
        }
        if let Some(transfer) = &transaction.transfer {
            if state.transfers.iter().any(|t| t.id == transfer.id) {
                return Err(StoreError::Conflict(format!("transfer {} already exists", transfer.id)));
            }
        }

        let now = Utc::now();
        let mut receipt = CommitReceipt::default();

        for change in transaction.stock {
            let entry = StockEntry {
                product_id: change.key.product_id.clone(),
                warehouse_id: change.key.warehouse_id.clone(),
                quantity: change.quantity,
                version: change.expected_version + 1,
                updated_at: Some(now),
            };
            state.entries.insert(change.key, entry.clone());
            receipt.entries.push(entry);
        }

        for change in transaction.counters {
            let counter = ProductStockCounter {
                product_id: change.product_id.clone(),
                quantity: change.quantity,
                version: change.expected_version + 1,
            };
            state.counters.insert(change.product_id, counter.clone());
            receipt.counters.push(counter);
        }

        let mut sequence = state.next_sequence();
        for movement in transaction.movements {
            let record = movement.into_record(sequence, now);
            sequence += 1;
            state.ledger.push(record.clone());
            receipt.movements.push(record);
        }

        if let Some(transfer) = transaction.transfer {
            state.transfers.push(transfer.clone());
            receipt.transfer = Some(transfer);
        }

        Ok(receipt)
    }

    fn movements(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .ledger
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    fn transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        Ok(self.read()?.transfers.clone())
    }

    fn load_counter(&self, product_id: &ProductId) -> Result<ProductStockCounter, StoreError> {
        Ok(self.read()?.counter(product_id))
    }
}

impl WarehouseDirectory for InMemoryInventoryStore {
    fn get_warehouse(&self, id: &WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.read()?.warehouses.get(id).cloned())
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        Ok(self.read()?.warehouses.values().cloned().collect())
    }

    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.warehouses.contains_key(&warehouse.id) {
            return Err(StoreError::Conflict(format!("warehouse '{}' already exists", warehouse.id)));
        }
        state.warehouses.insert(warehouse.id.clone(), warehouse);
        Ok(())
    }

    fn update_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.warehouses.get_mut(&warehouse.id) {
            Some(existing) => {
                *existing = warehouse;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("warehouse '{}'", warehouse.id))),
        }
    }

    fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state
            .warehouses
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("warehouse '{id}'")))
    }
}
