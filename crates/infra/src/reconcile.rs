//! Ledger replay and projection reconciliation.
//!
//! The stored stock table is a cache of the kardex. `reconcile` rebuilds every
//! (product, warehouse) quantity from the movement history and reports where
//! the cache disagrees; `repair_plan` turns a report into the stock writes that
//! bring the cache back in line.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use kardex_core::{ProductId, Quantity, WarehouseId};
use kardex_events::{EventEnvelope, Projection};
use kardex_inventory::{InventoryEvent, StockChange, StockKey};

use crate::ledger::envelope;
use crate::store::{EntryScope, InventoryStore, MovementFilter, StockTransaction, StoreError};

/// Quantities rebuilt purely from `MovementRecorded` facts.
///
/// Movements are deduplicated by id, not by sequence: concurrent commits may
/// reach the bus out of ledger order, and a redelivered movement is still
/// counted once. The same instance can follow the live bus and a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayedStock {
    quantities: BTreeMap<StockKey, Quantity>,
    applied: HashSet<Uuid>,
    position: u64,
}

impl ReplayedStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(&self, key: &StockKey) -> Quantity {
        self.quantities.get(key).copied().unwrap_or(Quantity::ZERO)
    }

    pub fn quantities(&self) -> &BTreeMap<StockKey, Quantity> {
        &self.quantities
    }

    /// Movements folded in so far.
    pub fn movements(&self) -> u64 {
        self.applied.len() as u64
    }
}

impl Projection for ReplayedStock {
    type Ev = InventoryEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let InventoryEvent::MovementRecorded(record) = envelope.payload() else {
            return;
        };
        if !self.applied.insert(envelope.event_id()) {
            return;
        }
        let key = StockKey::new(record.product_id.clone(), record.warehouse_id.clone());
        let slot = self.quantities.entry(key).or_insert(Quantity::ZERO);
        match slot.checked_add(record.quantity) {
            Ok(next) => *slot = next,
            // Left out of the total; reconciliation then reports the key.
            Err(err) => warn!(
                movement_id = %record.id,
                sequence = record.sequence,
                error = %err,
                "movement does not fit the replayed quantity"
            ),
        }
        self.position = self.position.max(envelope.sequence_number());
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// One (product, warehouse) whose stored quantity differs from its ledger sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub ledger_quantity: Quantity,
    pub stored_quantity: Quantity,
    /// Version of the stored entry when it was read (0 if absent).
    pub stored_version: u64,
}

impl Divergence {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.warehouse_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Distinct (product, warehouse) pairs seen in the ledger or the stock table.
    pub entries_checked: usize,
    pub movements_replayed: u64,
    /// Highest ledger sequence included in the replay.
    pub ledger_position: u64,
    pub divergences: Vec<Divergence>,
    pub checked_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Replay the whole ledger and compare it with the stored projection.
///
/// Reads the stock table before the ledger: a movement committed in between
/// shows up as a divergence that the next run clears, never as a silent miss.
pub fn reconcile<S>(store: &S) -> Result<ReconciliationReport, StoreError>
where
    S: InventoryStore + ?Sized,
{
    let stored = store.entries(&EntryScope::All)?;

    let mut replayed = ReplayedStock::new();
    for record in store.movements(&MovementFilter::default())? {
        replayed.apply(&envelope(InventoryEvent::MovementRecorded(record)));
    }

    let mut pairs: BTreeMap<StockKey, (Quantity, u64)> = stored
        .into_iter()
        .map(|e| (e.key(), (e.quantity, e.version)))
        .collect();
    for key in replayed.quantities().keys() {
        pairs.entry(key.clone()).or_insert((Quantity::ZERO, 0));
    }

    let divergences = pairs
        .iter()
        .filter_map(|(key, (stored_quantity, stored_version))| {
            let ledger_quantity = replayed.quantity(key);
            (ledger_quantity != *stored_quantity).then(|| Divergence {
                product_id: key.product_id.clone(),
                warehouse_id: key.warehouse_id.clone(),
                ledger_quantity,
                stored_quantity: *stored_quantity,
                stored_version: *stored_version,
            })
        })
        .collect();

    Ok(ReconciliationReport {
        entries_checked: pairs.len(),
        movements_replayed: replayed.movements(),
        ledger_position: replayed.position(),
        divergences,
        checked_at: Utc::now(),
    })
}

/// Stock writes for a report, plus the divergences they cannot fix.
#[derive(Debug, Clone, Default)]
pub struct RepairPlan {
    pub transaction: StockTransaction,
    pub repaired: Vec<Divergence>,
    /// Ledger sum is negative; a stock entry cannot hold it.
    pub unrepaired: Vec<Divergence>,
}

/// Outcome of rebuilding the stock table from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub entries_checked: usize,
    pub ledger_position: u64,
    pub repaired: Vec<Divergence>,
    pub unrepaired: Vec<Divergence>,
    pub rebuilt_at: DateTime<Utc>,
}

impl RebuildReport {
    pub fn new(report: &ReconciliationReport, plan: RepairPlan) -> Self {
        Self {
            entries_checked: report.entries_checked,
            ledger_position: report.ledger_position,
            repaired: plan.repaired,
            unrepaired: plan.unrepaired,
            rebuilt_at: Utc::now(),
        }
    }

    /// Every divergence found was written back.
    pub fn is_complete(&self) -> bool {
        self.unrepaired.is_empty()
    }
}

/// Split a report into the stock writes that set each divergent entry to its
/// ledger sum and the divergences no write can fix.
pub fn repair_plan(report: &ReconciliationReport) -> RepairPlan {
    let (unrepaired, repaired): (Vec<_>, Vec<_>) = report
        .divergences
        .iter()
        .cloned()
        .partition(|d| d.ledger_quantity.is_negative());
    let stock = repaired
        .iter()
        .map(|d| StockChange {
            key: d.key(),
            expected_version: d.stored_version,
            previous: d.stored_quantity,
            quantity: d.ledger_quantity,
        })
        .collect();

    RepairPlan {
        transaction: StockTransaction {
            stock,
            ..StockTransaction::default()
        },
        repaired,
        unrepaired,
    }
}
