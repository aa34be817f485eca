//! Per-warehouse stock levels and the legacy product-wide counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{DomainError, DomainResult, ProductId, Quantity, Versioned, WarehouseId};

/// Key of one stock level: a product in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }

    /// Event stream name for this key.
    pub fn stream(&self) -> String {
        format!("stock/{}/{}", self.product_id, self.warehouse_id)
    }
}

/// Current quantity of one product in one warehouse.
///
/// A missing entry reads as quantity 0 at version 0; it is created by the first
/// movement into the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: Quantity,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockEntry {
    pub fn empty(key: StockKey) -> Self {
        Self {
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            quantity: Quantity::ZERO,
            version: 0,
            updated_at: None,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.warehouse_id.clone())
    }

    /// Quantity after applying `delta`, refusing to go below zero.
    pub fn after(&self, delta: Quantity) -> DomainResult<Quantity> {
        let next = self.quantity.checked_add(delta)?;
        if next.is_negative() {
            return Err(DomainError::insufficient_stock(self.quantity, delta.abs()));
        }
        Ok(next)
    }
}

impl Versioned for StockEntry {
    fn version(&self) -> u64 {
        self.version
    }
}

/// The warehouse-agnostic `Product.stock` counter kept for sales and quality
/// control screens that do not know which warehouse they affect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockCounter {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub version: u64,
}

impl ProductStockCounter {
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: Quantity::ZERO,
            version: 0,
        }
    }
}

impl Versioned for ProductStockCounter {
    fn version(&self) -> u64 {
        self.version
    }
}
