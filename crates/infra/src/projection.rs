//! Warehouse Stock Projection: current quantity per (product, warehouse).

use serde::{Deserialize, Serialize};

use kardex_core::{ProductId, Quantity, WarehouseId};
use kardex_inventory::{StockChange, StockEntry, StockKey};

use crate::service::StockError;
use crate::store::{EntryScope, InventoryStore, StockTransaction, StoreError};

/// Stock held by one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub warehouse_id: WarehouseId,
    pub entries: Vec<StockEntry>,
    pub total: Quantity,
}

pub struct StockProjection<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> StockProjection<'a, S>
where
    S: InventoryStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn entry(&self, key: &StockKey) -> Result<StockEntry, StoreError> {
        self.store.load_entry(key)
    }

    /// Zero when nothing was ever recorded for the pair.
    pub fn get_stock(&self, product_id: &ProductId, warehouse_id: &WarehouseId) -> Result<Quantity, StoreError> {
        let key = StockKey::new(product_id.clone(), warehouse_id.clone());
        Ok(self.entry(&key)?.quantity)
    }

    /// Stage a new quantity, guarded by the version it was computed from.
    pub fn set_stock(&self, transaction: &mut StockTransaction, change: StockChange) {
        transaction.stock.push(change);
    }

    /// Sum of a product across all warehouses.
    pub fn total_stock(&self, product_id: &ProductId) -> Result<Quantity, StockError> {
        let entries = self
            .store
            .entries(&EntryScope::Product(product_id.clone()))?;
        Ok(Quantity::checked_sum(entries.iter().map(|e| e.quantity))?)
    }

    pub fn warehouse_stock(&self, warehouse_id: &WarehouseId) -> Result<WarehouseStock, StockError> {
        let entries = self
            .store
            .entries(&EntryScope::Warehouse(warehouse_id.clone()))?;
        let total = Quantity::checked_sum(entries.iter().map(|e| e.quantity))?;
        Ok(WarehouseStock {
            warehouse_id: warehouse_id.clone(),
            entries,
            total,
        })
    }

    pub fn list(&self) -> Result<Vec<StockEntry>, StoreError> {
        self.store.entries(&EntryScope::All)
    }
}
