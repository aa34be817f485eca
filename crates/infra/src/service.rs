//! Stock operations (application-level orchestration).
//!
//! `StockService` composes the Movement Ledger, the Stock Projection and the
//! warehouse directory behind the operations callers use:
//!
//! ```text
//! command
//!   ↓
//! 1. validate (no IO)
//!   ↓
//! 2. load snapshot: warehouse(s), stock entry/entries or counter (with versions),
//!    fresh on every attempt
//!   ↓
//! 3. plan (pure domain logic: quantities, movements, transfer record)
//!   ↓
//! 4. commit one StockTransaction (all writes or none, version-checked)
//!   ↓  conflict → back to 2, bounded by the RetryPolicy
//! 5. publish the committed facts to the bus
//! ```
//!
//! Validation and insufficient-stock rejections are final and never retried.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use kardex_core::{DomainError, ProductId, Quantity, WarehouseId};
use kardex_events::{Event, EventBus, EventEnvelope};
use kardex_inventory::{
    AdjustGlobalStock, ApplyMovement, EntradaReason, GlobalStockAdjusted, InventoryEvent,
    MovementDetails, MovementKind, MovementRecord, ProductStockCounter, SalidaReason, StockEntry,
    StockKey, Transfer, TransferStock, Warehouse, WarehouseDraft, WarehouseRemoved,
    WarehouseStatus,
};

use crate::config::RetryPolicy;
use crate::ledger::{MovementLedger, envelope};
use crate::projection::{StockProjection, WarehouseStock};
use crate::reconcile::{RebuildReport, ReconciliationReport, reconcile, repair_plan};
use crate::store::{
    CommitReceipt, InventoryStore, MovementFilter, StockTransaction, StoreError, WarehouseDirectory,
};

/// Caller-facing error of every stock operation.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        available: Quantity,
        requested: Quantity,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Duplicate key (e.g. a warehouse id that is already registered).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Concurrent updates kept invalidating the plan. Transient.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl StockError {
    fn is_retryable(&self) -> bool {
        matches!(self, StockError::Conflict(_))
    }
}

impl From<DomainError> for StockError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StockError::Validation(msg),
            DomainError::InvariantViolation(msg) => StockError::InvariantViolation(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => StockError::InsufficientStock {
                available,
                requested,
            },
            DomainError::NotFound(what) => StockError::NotFound(what),
            DomainError::Conflict(msg) => StockError::Conflict(msg),
        }
    }
}

impl From<StoreError> for StockError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => StockError::Conflict(msg),
            StoreError::NotFound(what) => StockError::NotFound(what),
            StoreError::Conflict(msg) => StockError::AlreadyExists(msg),
            other => StockError::Store(other),
        }
    }
}

/// A warehouse-attributed sale ("Realizar Venta").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    #[serde(default)]
    pub reference: String,
    pub date: NaiveDate,
}

/// Approved units from a quality-control inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityApproval {
    pub product_id: ProductId,
    /// Receiving warehouse; always explicit.
    pub warehouse_id: WarehouseId,
    pub approved: Decimal,
    #[serde(default)]
    pub reference: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub lot: Option<String>,
}

/// Stock held back for (or given back from) an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: Decimal,
    #[serde(default)]
    pub order_reference: String,
    pub date: NaiveDate,
}

/// A committed transfer with both of its ledger legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transfer: Transfer,
    pub outbound: MovementRecord,
    pub inbound: MovementRecord,
}

/// Inventory operations over a store and an event bus.
///
/// ## Generic Parameters
///
/// - `S`: storage (`InventoryStore` + `WarehouseDirectory`)
/// - `B`: bus receiving committed `InventoryEvent`s
///
/// Every operation is synchronous; with the Postgres store, call it from a
/// blocking thread.
pub struct StockService<S, B> {
    store: S,
    bus: B,
    retry: RetryPolicy,
}

impl<S, B> StockService<S, B>
where
    S: InventoryStore + WarehouseDirectory,
    B: EventBus<EventEnvelope<InventoryEvent>>,
{
    pub fn new(store: S, bus: B, retry: RetryPolicy) -> Self {
        Self { store, bus, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn ledger(&self) -> MovementLedger<'_, S> {
        MovementLedger::new(&self.store)
    }

    pub fn projection(&self) -> StockProjection<'_, S> {
        StockProjection::new(&self.store)
    }

    // ---------------------------------------------------------------------
    // Warehouses
    // ---------------------------------------------------------------------

    #[instrument(skip(self, draft), fields(name = %draft.name), err(level = "warn"))]
    pub fn register_warehouse(&self, draft: WarehouseDraft) -> Result<Warehouse, StockError> {
        let warehouse = Warehouse::register(draft, Utc::now())?;
        self.store.insert_warehouse(warehouse.clone())?;
        info!(warehouse_id = %warehouse.id, "warehouse registered");
        self.publish([InventoryEvent::WarehouseRegistered(warehouse.clone())]);
        Ok(warehouse)
    }

    #[instrument(skip(self, draft), fields(warehouse_id = %id), err(level = "warn"))]
    pub fn update_warehouse(
        &self,
        id: &WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<Warehouse, StockError> {
        let current = self.require_warehouse(id)?;
        let updated = current.update(draft, Utc::now())?;
        self.store.update_warehouse(updated.clone())?;
        info!("warehouse updated");
        self.publish([InventoryEvent::WarehouseUpdated(updated.clone())]);
        Ok(updated)
    }

    #[instrument(skip(self), fields(warehouse_id = %id), err(level = "warn"))]
    pub fn set_warehouse_status(
        &self,
        id: &WarehouseId,
        status: WarehouseStatus,
    ) -> Result<Warehouse, StockError> {
        let mut warehouse = self.require_warehouse(id)?;
        if warehouse.status == status {
            return Ok(warehouse);
        }
        warehouse.status = status;
        warehouse.updated_at = Utc::now();
        self.store.update_warehouse(warehouse.clone())?;
        info!(?status, "warehouse status changed");
        self.publish([InventoryEvent::WarehouseUpdated(warehouse.clone())]);
        Ok(warehouse)
    }

    /// Delete a warehouse descriptor. Its kardex history is kept.
    #[instrument(skip(self), fields(warehouse_id = %id), err(level = "warn"))]
    pub fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StockError> {
        self.require_warehouse(id)?;
        let stock = self.projection().warehouse_stock(id)?;
        if stock.entries.iter().any(|e| e.quantity.is_positive()) {
            return Err(StockError::InvariantViolation(format!(
                "warehouse '{id}' still holds {} units",
                stock.total
            )));
        }
        self.store.remove_warehouse(id)?;
        info!("warehouse removed");
        self.publish([InventoryEvent::WarehouseRemoved(WarehouseRemoved {
            warehouse_id: id.clone(),
            occurred_at: Utc::now(),
        })]);
        Ok(())
    }

    pub fn get_warehouse(&self, id: &WarehouseId) -> Result<Warehouse, StockError> {
        self.require_warehouse(id)
    }

    pub fn list_warehouses(&self) -> Result<Vec<Warehouse>, StockError> {
        Ok(self.store.list_warehouses()?)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Current quantity; zero if nothing was ever recorded for the pair.
    pub fn get_stock(
        &self,
        product_id: &ProductId,
        warehouse_id: &WarehouseId,
    ) -> Result<Quantity, StockError> {
        Ok(self.projection().get_stock(product_id, warehouse_id)?)
    }

    pub fn stock_entry(&self, key: &StockKey) -> Result<StockEntry, StockError> {
        Ok(self.projection().entry(key)?)
    }

    /// Sum of a product across every warehouse.
    pub fn total_stock(&self, product_id: &ProductId) -> Result<Quantity, StockError> {
        Ok(self.projection().total_stock(product_id)?)
    }

    pub fn warehouse_stock(&self, warehouse_id: &WarehouseId) -> Result<WarehouseStock, StockError> {
        self.require_warehouse(warehouse_id)?;
        Ok(self.projection().warehouse_stock(warehouse_id)?)
    }

    pub fn list_stock(&self) -> Result<Vec<StockEntry>, StockError> {
        Ok(self.projection().list()?)
    }

    pub fn movement_history(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StockError> {
        Ok(self.ledger().history(filter)?)
    }

    pub fn list_transfers(&self) -> Result<Vec<Transfer>, StockError> {
        Ok(self.store.transfers()?)
    }

    pub fn global_stock(&self, product_id: &ProductId) -> Result<ProductStockCounter, StockError> {
        Ok(self.store.load_counter(product_id)?)
    }

    // ---------------------------------------------------------------------
    // Stock-affecting operations
    // ---------------------------------------------------------------------

    /// Entrada / Salida / Ajuste / Reserva / Liberación on one warehouse.
    ///
    /// Not idempotent: the same command applied twice records two movements.
    #[instrument(
        skip(self, command),
        fields(
            product_id = %command.product_id,
            warehouse_id = %command.warehouse_id,
            kind = %command.kind,
            quantity = %command.quantity
        ),
        err(level = "warn")
    )]
    pub fn apply_movement(&self, command: ApplyMovement) -> Result<MovementRecord, StockError> {
        self.commit_movement(&command)
    }

    /// Move stock between two warehouses as one atomic unit.
    #[instrument(
        skip(self, command),
        fields(
            product_id = %command.product_id,
            source = %command.source_warehouse_id,
            destination = %command.destination_warehouse_id,
            quantity = %command.quantity
        ),
        err(level = "warn")
    )]
    pub fn transfer(&self, command: TransferStock) -> Result<TransferOutcome, StockError> {
        self.commit_transfer(&command)
    }

    /// Legacy warehouse-agnostic counter. Clamped at zero; writes no movement.
    #[instrument(skip(self), fields(product_id = %product_id, delta = %delta), err(level = "warn"))]
    pub fn adjust_global_stock(
        &self,
        product_id: &ProductId,
        delta: Decimal,
    ) -> Result<ProductStockCounter, StockError> {
        let command = AdjustGlobalStock {
            product_id: product_id.clone(),
            delta,
        };
        let (receipt, previous, applied) = self.with_retry("adjust_global_stock", || {
            let counter = self.store.load_counter(product_id)?;
            let plan = command.plan(&counter)?;
            let applied = plan.applied_delta;
            let receipt = self.store.commit(StockTransaction::from(plan))?;
            Ok((receipt, counter.quantity, applied))
        })?;

        let counter = first(receipt.counters, "counter")?;
        info!(previous = %previous, quantity = %counter.quantity, "global stock adjusted");
        self.publish([InventoryEvent::GlobalStockAdjusted(GlobalStockAdjusted {
            product_id: product_id.clone(),
            previous,
            quantity: counter.quantity,
            delta: applied,
            occurred_at: Utc::now(),
        })]);
        Ok(counter)
    }

    /// A sale leaves the given warehouse as a Salida with reason "Venta".
    pub fn complete_sale(&self, sale: SaleLine) -> Result<MovementRecord, StockError> {
        let reference = reference_or(sale.reference, "VT");
        self.apply_movement(ApplyMovement {
            product_id: sale.product_id,
            warehouse_id: sale.warehouse_id,
            kind: MovementKind::Salida,
            quantity: sale.quantity,
            details: MovementDetails::new(SalidaReason::Venta.label(), reference, sale.date),
        })
    }

    /// Approved units enter the given warehouse. Zero approved units is a no-op.
    pub fn approve_quality_control(
        &self,
        approval: QualityApproval,
    ) -> Result<Option<MovementRecord>, StockError> {
        if approval.approved.is_zero() {
            debug!(product_id = %approval.product_id, "nothing approved, no movement recorded");
            return Ok(None);
        }
        let mut details = MovementDetails::new(
            EntradaReason::ControlCalidad.label(),
            reference_or(approval.reference, "CC"),
            approval.date,
        );
        details.lot = approval.lot;
        self.apply_movement(ApplyMovement {
            product_id: approval.product_id,
            warehouse_id: approval.warehouse_id,
            kind: MovementKind::Entrada,
            quantity: approval.approved,
            details,
        })
        .map(Some)
    }

    /// Hold stock for an order (Reserva, requires available stock).
    pub fn reserve(&self, reservation: Reservation) -> Result<MovementRecord, StockError> {
        self.apply_movement(reservation_movement(reservation, MovementKind::Reserva, "Reserva"))
    }

    /// Give reserved stock back (Liberación).
    pub fn release(&self, reservation: Reservation) -> Result<MovementRecord, StockError> {
        self.apply_movement(reservation_movement(
            reservation,
            MovementKind::Liberacion,
            "Liberación de reserva",
        ))
    }

    // ---------------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------------

    /// Replay the ledger and compare it with the stored projection.
    #[instrument(skip(self), err)]
    pub fn reconcile(&self) -> Result<ReconciliationReport, StockError> {
        let report = reconcile(&self.store)?;
        if report.is_consistent() {
            info!(entries = report.entries_checked, "projection matches ledger");
        } else {
            warn!(
                entries = report.entries_checked,
                divergences = report.divergences.len(),
                "projection diverges from ledger"
            );
        }
        Ok(report)
    }

    /// Overwrite every divergent stock entry with its ledger sum.
    ///
    /// Divergences with a negative ledger sum cannot be written back; they are
    /// returned under `unrepaired` and left for manual correction.
    #[instrument(skip(self), err)]
    pub fn rebuild_projection(&self) -> Result<RebuildReport, StockError> {
        let rebuilt = self.with_retry("rebuild_projection", || {
            let report = reconcile(&self.store)?;
            let mut plan = repair_plan(&report);
            let transaction = std::mem::take(&mut plan.transaction);
            if !transaction.stock.is_empty() {
                self.store.commit(transaction)?;
            }
            Ok(RebuildReport::new(&report, plan))
        })?;

        if rebuilt.is_complete() {
            info!(repaired = rebuilt.repaired.len(), "projection rebuilt from ledger");
        } else {
            warn!(
                repaired = rebuilt.repaired.len(),
                unrepaired = rebuilt.unrepaired.len(),
                "projection rebuilt, negative ledger sums left in place"
            );
        }
        Ok(rebuilt)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn commit_movement(&self, command: &ApplyMovement) -> Result<MovementRecord, StockError> {
        command.validate()?;
        let key = command.key();

        let receipt = self.with_retry("apply_movement", || {
            let warehouse = self.require_warehouse(&command.warehouse_id)?;
            let entry = self.projection().entry(&key)?;
            let plan = command.plan(&warehouse, &entry)?;

            let mut transaction = StockTransaction::new();
            self.projection().set_stock(&mut transaction, plan.change);
            self.ledger().record(&mut transaction, plan.movement);
            Ok(self.store.commit(transaction)?)
        })?;

        let record = first(receipt.movements, "movement")?;
        info!(sequence = record.sequence, delta = %record.quantity, "movement recorded");
        self.publish([InventoryEvent::MovementRecorded(record.clone())]);
        Ok(record)
    }

    fn commit_transfer(&self, command: &TransferStock) -> Result<TransferOutcome, StockError> {
        command.validate()?;
        let (source_key, destination_key) = (command.source_key(), command.destination_key());

        let receipt = self.with_retry("transfer", || {
            let source = self.require_warehouse(&command.source_warehouse_id)?;
            let destination = self.require_warehouse(&command.destination_warehouse_id)?;
            let source_entry = self.projection().entry(&source_key)?;
            let destination_entry = self.projection().entry(&destination_key)?;
            let plan = command.plan(&source, &destination, &source_entry, &destination_entry, Utc::now())?;

            let mut transaction = StockTransaction::new();
            transaction.transfer = Some(plan.transfer);
            self.projection().set_stock(&mut transaction, plan.source);
            self.projection().set_stock(&mut transaction, plan.destination);
            self.ledger().record(&mut transaction, plan.outbound);
            self.ledger().record(&mut transaction, plan.inbound);
            Ok(self.store.commit(transaction)?)
        })?;

        let outcome = transfer_outcome(receipt)?;
        info!(transfer_id = %outcome.transfer.id, "transfer completed");
        self.publish([
            InventoryEvent::TransferCompleted(outcome.transfer.clone()),
            InventoryEvent::MovementRecorded(outcome.outbound.clone()),
            InventoryEvent::MovementRecorded(outcome.inbound.clone()),
        ]);
        Ok(outcome)
    }

    fn require_warehouse(&self, id: &WarehouseId) -> Result<Warehouse, StockError> {
        self.store
            .get_warehouse(id)?
            .ok_or_else(|| StockError::NotFound(format!("warehouse '{id}'")))
    }

    /// Run `attempt` until it stops failing with a concurrency conflict or the
    /// policy runs out of attempts.
    fn with_retry<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, StockError>,
    ) -> Result<T, StockError> {
        let mut n = 1;
        loop {
            match attempt() {
                Err(err) if err.is_retryable() => {
                    if n >= self.retry.max_attempts {
                        return Err(StockError::Conflict(format!(
                            "{operation} gave up after {n} attempts: {err}"
                        )));
                    }
                    debug!(operation, attempt = n, error = %err, "concurrent update, retrying");
                    std::thread::sleep(self.retry.delay_after(n));
                    n += 1;
                }
                result => return result,
            }
        }
    }

    /// Deliver committed facts. The commit stands even if delivery fails.
    fn publish<I>(&self, events: I)
    where
        I: IntoIterator<Item = InventoryEvent>,
    {
        for event in events {
            let event_type = event.event_type();
            if let Err(err) = self.bus.publish(envelope(event)) {
                warn!(event_type, error = ?err, "failed to publish committed inventory event");
            }
        }
    }
}

fn first<T>(items: Vec<T>, what: &str) -> Result<T, StockError> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| StockError::Store(StoreError::Backend(format!("commit returned no {what}"))))
}

fn transfer_outcome(receipt: CommitReceipt) -> Result<TransferOutcome, StockError> {
    let mut movements = receipt.movements.into_iter();
    match (receipt.transfer, movements.next(), movements.next()) {
        (Some(transfer), Some(outbound), Some(inbound)) => Ok(TransferOutcome {
            transfer,
            outbound,
            inbound,
        }),
        _ => Err(StockError::Store(StoreError::Backend(
            "commit returned an incomplete transfer".to_string(),
        ))),
    }
}

/// Keep a caller reference, or mint `{prefix}-{millis}` like the paper forms do.
fn reference_or(reference: String, prefix: &str) -> String {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        format!("{prefix}-{}", Utc::now().timestamp_millis())
    } else {
        trimmed.to_string()
    }
}

fn reservation_movement(reservation: Reservation, kind: MovementKind, reason: &str) -> ApplyMovement {
    ApplyMovement {
        product_id: reservation.product_id,
        warehouse_id: reservation.warehouse_id,
        kind,
        quantity: reservation.quantity,
        details: MovementDetails::new(reason, reservation.order_reference, reservation.date),
    }
}
