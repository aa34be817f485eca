//! Warehouse-to-warehouse transfers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{ProductId, Quantity, TransferId, WarehouseId};

/// Transfer status. Transfers are recorded once both legs are committed, so the
/// only state that is ever persisted is `Completed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    #[serde(rename = "Completada", alias = "Completed")]
    Completed,
}

/// A completed movement of one product between two warehouses.
///
/// Realized as exactly two `Transferencia` movements (−q at the source, +q at the
/// destination) sharing this transfer's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub product_id: ProductId,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    pub quantity: Quantity,
    pub reason: String,
    pub reference: String,
    pub date: NaiveDate,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn stream(&self) -> String {
        format!("transfer/{}", self.id)
    }
}

