//! Stock-affecting commands and the plans they produce.
//!
//! Planning is pure: a command plus the current snapshot (warehouse descriptor,
//! stock entry, counter) yields either a rejection or a plan. A plan records the
//! version each write was computed from, so committing it is a compare-and-set.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kardex_core::{DomainError, DomainResult, ProductId, Quantity, TransferId, WarehouseId};

use crate::movement::{MovementDetails, MovementKind, NewMovement};
use crate::stock::{ProductStockCounter, StockEntry, StockKey};
use crate::transfer::{Transfer, TransferStatus};
use crate::warehouse::Warehouse;

/// A guarded write of one stock level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub key: StockKey,
    /// Version the new quantity was computed from.
    pub expected_version: u64,
    pub previous: Quantity,
    pub quantity: Quantity,
}

impl StockChange {
    fn from_entry(entry: &StockEntry, quantity: Quantity) -> Self {
        Self {
            key: entry.key(),
            expected_version: entry.version,
            previous: entry.quantity,
            quantity,
        }
    }
}

/// A guarded write of the product-wide counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterChange {
    pub product_id: ProductId,
    pub expected_version: u64,
    pub previous: Quantity,
    pub quantity: Quantity,
}

/// Entrada / Salida / Ajuste / Reserva / Liberación on a single warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMovement {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    /// Magnitude for Entrada/Salida/Reserva/Liberación; signed delta for Ajuste.
    pub quantity: Decimal,
    #[serde(flatten)]
    pub details: MovementDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub change: StockChange,
    pub movement: NewMovement,
}

impl ApplyMovement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.warehouse_id.clone())
    }

    /// Checks that need no stored state. Run before any read.
    pub fn validate(&self) -> DomainResult<Quantity> {
        if self.kind == MovementKind::Transferencia {
            return Err(DomainError::validation(
                "transfer movements are created by the transfer operation",
            ));
        }
        self.kind.signed_delta(self.quantity)
    }

    pub fn plan(&self, warehouse: &Warehouse, entry: &StockEntry) -> DomainResult<MovementPlan> {
        let delta = self.validate()?;
        if warehouse.id != self.warehouse_id || entry.key() != self.key() {
            return Err(DomainError::invariant("snapshot does not belong to this movement"));
        }
        warehouse.ensure_active()?;

        let quantity = entry.after(delta)?;
        let movement = NewMovement::new(
            self.product_id.clone(),
            self.warehouse_id.clone(),
            self.kind,
            delta,
            self.details.clone(),
        )?;

        Ok(MovementPlan {
            change: StockChange::from_entry(entry, quantity),
            movement,
        })
    }
}

/// Move stock of one product between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub product_id: ProductId,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: String,
    pub date: NaiveDate,
}

/// Everything a transfer writes: one record, two stock levels, two movements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub transfer: Transfer,
    pub source: StockChange,
    pub destination: StockChange,
    pub outbound: NewMovement,
    pub inbound: NewMovement,
}

impl TransferStock {
    pub fn source_key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.source_warehouse_id.clone())
    }

    pub fn destination_key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.destination_warehouse_id.clone())
    }

    /// Checks that need no stored state. Run before any read.
    pub fn validate(&self) -> DomainResult<Quantity> {
        if self.source_warehouse_id == self.destination_warehouse_id {
            return Err(DomainError::validation(
                "source and destination warehouse cannot be the same",
            ));
        }
        Quantity::positive(self.quantity)
    }

    pub fn plan(
        &self,
        source: &Warehouse,
        destination: &Warehouse,
        source_entry: &StockEntry,
        destination_entry: &StockEntry,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferPlan> {
        let quantity = self.validate()?;
        if source.id != self.source_warehouse_id
            || destination.id != self.destination_warehouse_id
            || source_entry.key() != self.source_key()
            || destination_entry.key() != self.destination_key()
        {
            return Err(DomainError::invariant("snapshot does not belong to this transfer"));
        }
        source.ensure_active()?;
        destination.ensure_active()?;

        let source_after = source_entry.after(-quantity)?;
        let destination_after = destination_entry.after(quantity)?;

        let transfer_id = TransferId::new();
        let reference = format!("TR-{}", transfer_id.as_uuid().simple());

        let outbound = NewMovement::new(
            self.product_id.clone(),
            self.source_warehouse_id.clone(),
            MovementKind::Transferencia,
            -quantity,
            MovementDetails::new(format!("Transferencia a {}", destination.name), reference.clone(), self.date),
        )?
        .with_transfer(transfer_id);

        let inbound = NewMovement::new(
            self.product_id.clone(),
            self.destination_warehouse_id.clone(),
            MovementKind::Transferencia,
            quantity,
            MovementDetails::new(format!("Transferencia desde {}", source.name), reference.clone(), self.date),
        )?
        .with_transfer(transfer_id);

        let transfer = Transfer {
            id: transfer_id,
            product_id: self.product_id.clone(),
            source_warehouse_id: self.source_warehouse_id.clone(),
            destination_warehouse_id: self.destination_warehouse_id.clone(),
            quantity,
            reason: self.reason.trim().to_string(),
            reference,
            date: self.date,
            status: TransferStatus::Completed,
            created_at: now,
        };

        Ok(TransferPlan {
            transfer,
            source: StockChange::from_entry(source_entry, source_after),
            destination: StockChange::from_entry(destination_entry, destination_after),
            outbound,
            inbound,
        })
    }
}

/// Change the warehouse-agnostic product counter. Clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustGlobalStock {
    pub product_id: ProductId,
    pub delta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStockPlan {
    pub change: CounterChange,
    /// Delta actually applied after clamping (never more negative than the counter).
    pub applied_delta: Quantity,
}

impl AdjustGlobalStock {
    pub fn plan(&self, counter: &ProductStockCounter) -> DomainResult<GlobalStockPlan> {
        if self.delta.is_zero() {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if counter.product_id != self.product_id {
            return Err(DomainError::invariant("counter does not belong to this product"));
        }
        let quantity = counter
            .quantity
            .checked_add(Quantity::new(self.delta))?
            .floor_zero();

        Ok(GlobalStockPlan {
            applied_delta: quantity - counter.quantity,
            change: CounterChange {
                product_id: self.product_id.clone(),
                expected_version: counter.version,
                previous: counter.quantity,
                quantity,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{WarehouseDraft, WarehouseStatus};
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn product() -> ProductId {
        ProductId::new("p1").unwrap()
    }

    fn warehouse(id: &str) -> Warehouse {
        Warehouse::register(WarehouseDraft::named(format!("Almacén {id}")).with_id(id), Utc::now()).unwrap()
    }

    fn entry(warehouse_id: &str, quantity: i64, version: u64) -> StockEntry {
        let mut e = StockEntry::empty(StockKey::new(product(), WarehouseId::new(warehouse_id).unwrap()));
        e.quantity = Quantity::from(quantity);
        e.version = version;
        e
    }

    fn movement(kind: MovementKind, quantity: i64) -> ApplyMovement {
        ApplyMovement {
            product_id: product(),
            warehouse_id: WarehouseId::new("A").unwrap(),
            kind,
            quantity: Decimal::from(quantity),
            details: MovementDetails::new("Compra", "", date()),
        }
    }

    fn transfer(quantity: i64) -> TransferStock {
        TransferStock {
            product_id: product(),
            source_warehouse_id: WarehouseId::new("A").unwrap(),
            destination_warehouse_id: WarehouseId::new("B").unwrap(),
            quantity: Decimal::from(quantity),
            reason: "Reposición".to_string(),
            date: date(),
        }
    }

    #[test]
    fn entrada_on_empty_entry_creates_positive_movement() {
        let plan = movement(MovementKind::Entrada, 50)
            .plan(&warehouse("A"), &entry("A", 0, 0))
            .unwrap();
        assert_eq!(plan.change.quantity, Quantity::from(50));
        assert_eq!(plan.change.expected_version, 0);
        assert_eq!(plan.movement.quantity, Quantity::from(50));
        assert_eq!(plan.movement.kind, MovementKind::Entrada);
    }

    #[test]
    fn salida_beyond_stock_is_rejected() {
        let err = movement(MovementKind::Salida, 15)
            .plan(&warehouse("A"), &entry("A", 10, 3))
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(Quantity::from(10), Quantity::from(15)));
    }

    #[test]
    fn transferencia_cannot_be_applied_directly() {
        assert!(movement(MovementKind::Transferencia, 5).validate().is_err());
    }

    #[test]
    fn inactive_warehouse_rejects_movements() {
        let mut w = warehouse("A");
        w.status = WarehouseStatus::Inactive;
        assert!(movement(MovementKind::Entrada, 1).plan(&w, &entry("A", 0, 0)).is_err());
    }

    #[test]
    fn snapshot_for_another_warehouse_is_rejected() {
        let err = movement(MovementKind::Entrada, 1)
            .plan(&warehouse("A"), &entry("B", 0, 0))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn transfer_plan_moves_quantity_between_entries() {
        let plan = transfer(30)
            .plan(&warehouse("A"), &warehouse("B"), &entry("A", 100, 4), &entry("B", 0, 0), Utc::now())
            .unwrap();

        assert_eq!(plan.source.quantity, Quantity::from(70));
        assert_eq!(plan.source.expected_version, 4);
        assert_eq!(plan.destination.quantity, Quantity::from(30));
        assert_eq!(plan.outbound.quantity, Quantity::from(-30));
        assert_eq!(plan.inbound.quantity, Quantity::from(30));
        assert_eq!(plan.outbound.transfer_id, Some(plan.transfer.id));
        assert_eq!(plan.inbound.transfer_id, Some(plan.transfer.id));
        assert_eq!(plan.outbound.details.reason, "Transferencia a Almacén B");
        assert_eq!(plan.inbound.details.reason, "Transferencia desde Almacén A");
        assert_eq!(plan.transfer.status, TransferStatus::Completed);
    }

    #[test]
    fn transfer_to_same_warehouse_is_rejected() {
        let mut cmd = transfer(1);
        cmd.destination_warehouse_id = cmd.source_warehouse_id.clone();
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn transfer_of_zero_is_rejected() {
        assert!(matches!(transfer(0).validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn transfer_beyond_source_stock_is_rejected() {
        let err = transfer(11)
            .plan(&warehouse("A"), &warehouse("B"), &entry("A", 10, 1), &entry("B", 0, 0), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(Quantity::from(10), Quantity::from(11)));
    }

    #[test]
    fn global_adjustment_clamps_at_zero() {
        let mut counter = ProductStockCounter::empty(product());
        counter.quantity = Quantity::from(3);
        let plan = AdjustGlobalStock {
            product_id: product(),
            delta: Decimal::from(-10),
        }
        .plan(&counter)
        .unwrap();
        assert_eq!(plan.change.quantity, Quantity::ZERO);
        assert_eq!(plan.applied_delta, Quantity::from(-3));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Applying accepted plans keeps the entry equal to the sum of recorded
        /// deltas and never negative; rejected plans change nothing.
        #[test]
        fn accepted_plans_keep_entry_equal_to_ledger_sum(
            ops in prop::collection::vec((0u8..3, 1i64..200), 1..60)
        ) {
            let w = warehouse("A");
            let mut current = entry("A", 0, 0);
            let mut ledger_sum = Quantity::ZERO;

            for (kind, qty) in ops {
                let kind = match kind {
                    0 => MovementKind::Entrada,
                    1 => MovementKind::Salida,
                    _ => MovementKind::Reserva,
                };
                let before = current.clone();
                match movement(kind, qty).plan(&w, &current) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.change.expected_version, current.version);
                        ledger_sum = ledger_sum.checked_add(plan.movement.quantity).unwrap();
                        current.quantity = plan.change.quantity;
                        current.version += 1;
                    }
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert_eq!(&current, &before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                prop_assert!(!current.quantity.is_negative());
                prop_assert_eq!(current.quantity, ledger_sum);
            }
        }

        /// A transfer never changes the combined quantity of the two warehouses.
        #[test]
        fn transfers_conserve_quantity(source in 0i64..500, destination in 0i64..500, qty in 1i64..600) {
            let result = transfer(qty).plan(
                &warehouse("A"),
                &warehouse("B"),
                &entry("A", source, 1),
                &entry("B", destination, 1),
                Utc::now(),
            );
            match result {
                Ok(plan) => {
                    prop_assert!(qty <= source);
                    prop_assert_eq!(
                        plan.source.quantity.checked_add(plan.destination.quantity).unwrap(),
                        Quantity::from(source + destination)
                    );
                    prop_assert_eq!(plan.outbound.quantity, -plan.inbound.quantity);
                }
                Err(e) => {
                    prop_assert!(qty > source);
                    let is_insufficient = matches!(e, DomainError::InsufficientStock { .. });
                    prop_assert!(is_insufficient);
                }
            }
        }
    }
}
