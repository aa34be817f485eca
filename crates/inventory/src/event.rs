use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{ProductId, Quantity, WarehouseId};
use kardex_events::Event;

use crate::movement::MovementRecord;
use crate::stock::StockKey;
use crate::transfer::Transfer;
use crate::warehouse::Warehouse;

/// Event: GlobalStockAdjusted (legacy product-wide counter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStockAdjusted {
    pub product_id: ProductId,
    pub previous: Quantity,
    pub quantity: Quantity,
    /// Delta actually applied after clamping at zero.
    pub delta: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseRemoved {
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Facts published after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    MovementRecorded(MovementRecord),
    TransferCompleted(Transfer),
    GlobalStockAdjusted(GlobalStockAdjusted),
    WarehouseRegistered(Warehouse),
    WarehouseUpdated(Warehouse),
    WarehouseRemoved(WarehouseRemoved),
}

impl Event for InventoryEvent {
    fn stream(&self) -> String {
        match self {
            InventoryEvent::MovementRecorded(m) => {
                StockKey::new(m.product_id.clone(), m.warehouse_id.clone()).stream()
            }
            InventoryEvent::TransferCompleted(t) => t.stream(),
            InventoryEvent::GlobalStockAdjusted(e) => format!("product/{}", e.product_id),
            InventoryEvent::WarehouseRegistered(w) | InventoryEvent::WarehouseUpdated(w) => {
                format!("warehouse/{}", w.id)
            }
            InventoryEvent::WarehouseRemoved(e) => format!("warehouse/{}", e.warehouse_id),
        }
    }

    fn ledger_sequence(&self) -> Option<u64> {
        match self {
            InventoryEvent::MovementRecorded(m) => Some(m.sequence),
            _ => None,
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::MovementRecorded(_) => "inventory.movement.recorded",
            InventoryEvent::TransferCompleted(_) => "inventory.transfer.completed",
            InventoryEvent::GlobalStockAdjusted(_) => "inventory.product.global_stock_adjusted",
            InventoryEvent::WarehouseRegistered(_) => "inventory.warehouse.registered",
            InventoryEvent::WarehouseUpdated(_) => "inventory.warehouse.updated",
            InventoryEvent::WarehouseRemoved(_) => "inventory.warehouse.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::MovementRecorded(m) => m.recorded_at,
            InventoryEvent::TransferCompleted(t) => t.created_at,
            InventoryEvent::GlobalStockAdjusted(e) => e.occurred_at,
            InventoryEvent::WarehouseRegistered(w) => w.created_at,
            InventoryEvent::WarehouseUpdated(w) => w.updated_at,
            InventoryEvent::WarehouseRemoved(e) => e.occurred_at,
        }
    }
}
