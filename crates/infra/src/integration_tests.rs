//! Integration tests for the full stock pipeline.
//!
//! Tests: Command → StockService → InventoryStore → EventBus → Projection
//!
//! Verifies:
//! - ledger and stock projection stay equal after every operation
//! - rejected operations leave no trace
//! - transfers conserve quantity and are atomic
//! - concurrent writers on one key never lose an update

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use kardex_core::{ProductId, Quantity, WarehouseId};
use kardex_events::{EventBus, EventEnvelope, InMemoryEventBus, Projection};
use kardex_inventory::{
    ApplyMovement, InventoryEvent, MovementDetails, MovementKind, StockChange, StockKey,
    TransferStock, WarehouseDraft, WarehouseStatus,
};

use crate::config::RetryPolicy;
use crate::reconcile::ReplayedStock;
use crate::service::{QualityApproval, Reservation, SaleLine, StockError, StockService};
use crate::store::{InMemoryInventoryStore, InventoryStore, MovementFilter, StockTransaction};

type Bus = Arc<InMemoryEventBus<EventEnvelope<InventoryEvent>>>;
type Service = StockService<Arc<InMemoryInventoryStore>, Bus>;

fn setup() -> Service {
    let service = StockService::new(
        Arc::new(InMemoryInventoryStore::new()),
        Arc::new(InMemoryEventBus::new()),
        RetryPolicy::new(1_000, Duration::ZERO),
    );
    for (id, name) in [("A", "Almacén Central"), ("B", "Sucursal Norte")] {
        service
            .register_warehouse(WarehouseDraft::named(name).with_id(id))
            .unwrap();
    }
    service
}

fn p1() -> ProductId {
    ProductId::new("p1").unwrap()
}

fn wh(id: &str) -> WarehouseId {
    WarehouseId::new(id).unwrap()
}

fn key(w: &str) -> StockKey {
    StockKey::new(p1(), wh(w))
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn movement(w: &str, kind: MovementKind, qty: i64, reason: &str) -> ApplyMovement {
    ApplyMovement {
        product_id: p1(),
        warehouse_id: wh(w),
        kind,
        quantity: Decimal::from(qty),
        details: MovementDetails::new(reason, "", date()),
    }
}

fn transfer(from: &str, to: &str, qty: i64) -> TransferStock {
    TransferStock {
        product_id: p1(),
        source_warehouse_id: wh(from),
        destination_warehouse_id: wh(to),
        quantity: Decimal::from(qty),
        reason: "Reposición".to_string(),
        date: date(),
    }
}

fn stock(service: &Service, w: &str) -> Quantity {
    service.get_stock(&p1(), &wh(w)).unwrap()
}

fn history(service: &Service) -> Vec<kardex_inventory::MovementRecord> {
    service.movement_history(&MovementFilter::default()).unwrap()
}

fn assert_ledger_matches_projection(service: &Service) {
    let report = service.reconcile().unwrap();
    assert!(report.is_consistent(), "divergences: {:?}", report.divergences);
}

#[test]
fn entrada_on_empty_stock_records_one_positive_movement() {
    let service = setup();
    let record = service
        .apply_movement(movement("A", MovementKind::Entrada, 50, "Compra"))
        .unwrap();

    assert_eq!(stock(&service, "A"), Quantity::from(50));
    assert_eq!(record.kind, MovementKind::Entrada);
    assert_eq!(record.quantity, Quantity::from(50));
    assert_eq!(record.reason, "Compra");
    assert_eq!(history(&service).len(), 1);
    assert_ledger_matches_projection(&service);
}

#[test]
fn salida_beyond_stock_is_rejected_without_side_effects() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 10, "Compra"))
        .unwrap();

    let err = service
        .apply_movement(movement("A", MovementKind::Salida, 15, "Venta"))
        .unwrap_err();

    match err {
        StockError::InsufficientStock {
            available,
            requested,
        } => {
            assert_eq!(available, Quantity::from(10));
            assert_eq!(requested, Quantity::from(15));
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert_eq!(stock(&service, "A"), Quantity::from(10));
    assert_eq!(history(&service).len(), 1);
}

#[test]
fn transfer_moves_stock_with_two_opposite_legs() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 100, "Compra"))
        .unwrap();

    let outcome = service.transfer(transfer("A", "B", 30)).unwrap();

    assert_eq!(stock(&service, "A"), Quantity::from(70));
    assert_eq!(stock(&service, "B"), Quantity::from(30));
    assert_eq!(outcome.outbound.kind, MovementKind::Transferencia);
    assert_eq!(outcome.inbound.kind, MovementKind::Transferencia);
    assert_eq!(outcome.outbound.quantity, Quantity::from(-30));
    assert_eq!(outcome.inbound.quantity, Quantity::from(30));
    assert_eq!(outcome.outbound.reason, "Transferencia a Sucursal Norte");
    assert_eq!(outcome.inbound.reason, "Transferencia desde Almacén Central");

    let legs = service
        .movement_history(&MovementFilter {
            transfer_id: Some(outcome.transfer.id),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(service.list_transfers().unwrap(), vec![outcome.transfer]);
    assert_eq!(service.total_stock(&p1()).unwrap(), Quantity::from(100));
    assert_ledger_matches_projection(&service);
}

#[test]
fn rejected_transfers_leave_no_trace() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 10, "Compra"))
        .unwrap();

    assert!(matches!(
        service.transfer(transfer("A", "A", 5)),
        Err(StockError::Validation(_))
    ));
    assert!(matches!(
        service.transfer(transfer("A", "B", 0)),
        Err(StockError::Validation(_))
    ));
    assert!(matches!(
        service.transfer(transfer("A", "B", 11)),
        Err(StockError::InsufficientStock { .. })
    ));
    assert!(matches!(
        service.transfer(transfer("A", "Z", 1)),
        Err(StockError::NotFound(_))
    ));

    assert_eq!(stock(&service, "A"), Quantity::from(10));
    assert_eq!(stock(&service, "B"), Quantity::ZERO);
    assert_eq!(history(&service).len(), 1);
    assert!(service.list_transfers().unwrap().is_empty());
}

#[test]
fn apply_movement_is_not_idempotent() {
    let service = setup();
    let command = movement("A", MovementKind::Entrada, 5, "Compra");
    service.apply_movement(command.clone()).unwrap();
    service.apply_movement(command).unwrap();

    assert_eq!(stock(&service, "A"), Quantity::from(10));
    assert_eq!(history(&service).len(), 2);
}

#[test]
fn ajuste_takes_the_callers_sign() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Ajuste, 8, "Ajuste Positivo"))
        .unwrap();
    service
        .apply_movement(movement("A", MovementKind::Ajuste, -3, "Ajuste Negativo"))
        .unwrap();
    assert_eq!(stock(&service, "A"), Quantity::from(5));

    assert!(matches!(
        service.apply_movement(movement("A", MovementKind::Ajuste, -6, "Ajuste Negativo")),
        Err(StockError::InsufficientStock { .. })
    ));
}

#[test]
fn unknown_and_inactive_warehouses_reject_movements() {
    let service = setup();
    assert!(matches!(
        service.apply_movement(movement("Z", MovementKind::Entrada, 1, "Compra")),
        Err(StockError::NotFound(_))
    ));

    service
        .set_warehouse_status(&wh("B"), WarehouseStatus::Inactive)
        .unwrap();
    assert!(matches!(
        service.apply_movement(movement("B", MovementKind::Entrada, 1, "Compra")),
        Err(StockError::Validation(_))
    ));
    assert!(history(&service).is_empty());
}

#[test]
fn warehouse_holding_stock_cannot_be_removed() {
    let service = setup();
    service
        .apply_movement(movement("B", MovementKind::Entrada, 4, "Compra"))
        .unwrap();
    assert!(matches!(
        service.remove_warehouse(&wh("B")),
        Err(StockError::InvariantViolation(_))
    ));

    service
        .apply_movement(movement("B", MovementKind::Salida, 4, "Merma"))
        .unwrap();
    service.remove_warehouse(&wh("B")).unwrap();

    assert!(matches!(service.get_warehouse(&wh("B")), Err(StockError::NotFound(_))));
    // History outlives the descriptor.
    assert_eq!(history(&service).len(), 2);
}

#[test]
fn duplicate_warehouse_ids_are_rejected() {
    let service = setup();
    assert!(matches!(
        service.register_warehouse(WarehouseDraft::named("Otro").with_id("A")),
        Err(StockError::AlreadyExists(_))
    ));
}

#[test]
fn global_counter_clamps_at_zero_and_writes_no_movement() {
    let service = setup();
    let counter = service.adjust_global_stock(&p1(), Decimal::from(3)).unwrap();
    assert_eq!(counter.quantity, Quantity::from(3));

    let counter = service.adjust_global_stock(&p1(), Decimal::from(-10)).unwrap();
    assert_eq!(counter.quantity, Quantity::ZERO);
    assert_eq!(counter.version, 2);

    assert!(matches!(
        service.adjust_global_stock(&p1(), Decimal::ZERO),
        Err(StockError::Validation(_))
    ));
    assert!(history(&service).is_empty());
}

#[test]
fn sales_and_quality_control_go_through_the_ledger() {
    let service = setup();
    let approved = service
        .approve_quality_control(QualityApproval {
            product_id: p1(),
            warehouse_id: wh("A"),
            approved: Decimal::from(12),
            reference: String::new(),
            date: date(),
            lot: Some("L-01".to_string()),
        })
        .unwrap()
        .unwrap();
    assert_eq!(approved.reason, "Control de Calidad - Aprobado");
    assert!(approved.reference.starts_with("CC-"));
    assert_eq!(approved.lot.as_deref(), Some("L-01"));

    let sold = service
        .complete_sale(SaleLine {
            product_id: p1(),
            warehouse_id: wh("A"),
            quantity: Decimal::from(5),
            reference: "F001-23".to_string(),
            date: date(),
        })
        .unwrap();
    assert_eq!(sold.kind, MovementKind::Salida);
    assert_eq!(sold.reason, "Venta");
    assert_eq!(sold.quantity, Quantity::from(-5));

    let nothing = service
        .approve_quality_control(QualityApproval {
            product_id: p1(),
            warehouse_id: wh("A"),
            approved: Decimal::ZERO,
            reference: String::new(),
            date: date(),
            lot: None,
        })
        .unwrap();
    assert!(nothing.is_none());

    assert_eq!(stock(&service, "A"), Quantity::from(7));
    assert_ledger_matches_projection(&service);
}

#[test]
fn reservations_hold_and_release_stock() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 10, "Compra"))
        .unwrap();

    let reservation = Reservation {
        product_id: p1(),
        warehouse_id: wh("A"),
        quantity: Decimal::from(4),
        order_reference: "PED-9".to_string(),
        date: date(),
    };
    let held = service.reserve(reservation.clone()).unwrap();
    assert_eq!(held.kind, MovementKind::Reserva);
    assert_eq!(stock(&service, "A"), Quantity::from(6));

    let released = service.release(reservation).unwrap();
    assert_eq!(released.kind, MovementKind::Liberacion);
    assert_eq!(stock(&service, "A"), Quantity::from(10));

    assert!(matches!(
        service.reserve(Reservation {
            product_id: p1(),
            warehouse_id: wh("A"),
            quantity: Decimal::from(11),
            order_reference: "PED-10".to_string(),
            date: date(),
        }),
        Err(StockError::InsufficientStock { .. })
    ));
}

#[test]
fn history_filters_by_kind_and_search_term() {
    let service = setup();
    let mut with_lot = movement("A", MovementKind::Entrada, 10, "Compra");
    with_lot.details.lot = Some("LOTE-77".to_string());
    service.apply_movement(with_lot).unwrap();
    service
        .apply_movement(movement("A", MovementKind::Salida, 2, "Merma"))
        .unwrap();
    service
        .apply_movement(movement("A", MovementKind::Salida, 1, "Venta"))
        .unwrap();

    let salidas = service
        .movement_history(&MovementFilter {
            kind: Some(MovementKind::Salida),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(salidas.len(), 2);

    let mermas = service
        .movement_history(&MovementFilter {
            kind: Some(MovementKind::Salida),
            reason: Some(" merma ".to_string()),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(mermas.len(), 1);
    assert_eq!(mermas[0].reason, "Merma");

    let by_lot = service
        .movement_history(&MovementFilter {
            search: Some("lote-77".to_string()),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(by_lot.len(), 1);
    assert_eq!(by_lot[0].kind, MovementKind::Entrada);
}

#[test]
fn warehouse_stock_lists_entries_and_total() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 3, "Compra"))
        .unwrap();
    let mut other = movement("A", MovementKind::Entrada, 4, "Compra");
    other.product_id = ProductId::new("p2").unwrap();
    service.apply_movement(other).unwrap();

    let stock = service.warehouse_stock(&wh("A")).unwrap();
    assert_eq!(stock.entries.len(), 2);
    assert_eq!(stock.total, Quantity::from(7));
    assert!(matches!(service.warehouse_stock(&wh("Z")), Err(StockError::NotFound(_))));
}

#[test]
fn live_projection_follows_the_bus() {
    let service = setup();
    let subscription = service.bus().subscribe();

    service
        .apply_movement(movement("A", MovementKind::Entrada, 20, "Compra"))
        .unwrap();
    service.transfer(transfer("A", "B", 8)).unwrap();
    service
        .apply_movement(movement("B", MovementKind::Salida, 3, "Consumo Interno"))
        .unwrap();

    let mut live = ReplayedStock::new();
    let envelopes = subscription.drain();
    for env in &envelopes {
        live.apply(env);
    }
    // Redelivery is harmless.
    for env in &envelopes {
        live.apply(env);
    }

    assert_eq!(live.quantity(&key("A")), stock(&service, "A"));
    assert_eq!(live.quantity(&key("B")), stock(&service, "B"));
    assert_eq!(live.movements(), 4);
}

#[test]
fn live_projection_keeps_up_with_concurrent_writers() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 100, "Compra"))
        .unwrap();
    let subscription = service.bus().subscribe();
    let mut live = ReplayedStock::new();
    for record in history(&service) {
        live.apply(&crate::ledger::envelope(InventoryEvent::MovementRecorded(record)));
    }

    std::thread::scope(|scope| {
        for i in 0..6 {
            let service = &service;
            scope.spawn(move || {
                for _ in 0..30 {
                    let result = match i % 3 {
                        0 => service
                            .apply_movement(movement("A", MovementKind::Entrada, 2, "Compra"))
                            .map(|_| ()),
                        1 => service
                            .apply_movement(movement("B", MovementKind::Salida, 1, "Venta"))
                            .map(|_| ()),
                        _ => service.transfer(transfer("A", "B", 3)).map(|_| ()),
                    };
                    match result {
                        Ok(()) | Err(StockError::InsufficientStock { .. }) => {}
                        Err(other) => panic!("unexpected error {other:?}"),
                    }
                }
            });
        }
    });

    for env in subscription.drain() {
        live.apply(&env);
    }

    assert_eq!(live.movements(), history(&service).len() as u64);
    assert_eq!(live.quantity(&key("A")), stock(&service, "A"));
    assert_eq!(live.quantity(&key("B")), stock(&service, "B"));
    assert_ledger_matches_projection(&service);
}

#[test]
fn totals_beyond_the_decimal_range_are_rejected_not_panicking() {
    let service = setup();
    let half_max: Decimal = "50000000000000000000000000000".parse().unwrap();
    for w in ["A", "B"] {
        let mut entrada = movement(w, MovementKind::Entrada, 1, "Compra");
        entrada.quantity = half_max;
        service.apply_movement(entrada).unwrap();
    }

    assert!(matches!(service.total_stock(&p1()), Err(StockError::Validation(_))));
    assert_eq!(service.ledger().balance(&key("A")).unwrap(), Quantity::new(half_max));
    assert_eq!(service.warehouse_stock(&wh("B")).unwrap().total, Quantity::new(half_max));
    assert_ledger_matches_projection(&service);
}

#[test]
fn rebuild_projection_repairs_divergent_entries() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 9, "Compra"))
        .unwrap();

    // Corrupt the cache behind the ledger's back.
    let entry = service.stock_entry(&key("A")).unwrap();
    service
        .store()
        .commit(StockTransaction {
            stock: vec![StockChange {
                key: key("A"),
                expected_version: entry.version,
                previous: entry.quantity,
                quantity: Quantity::from(2),
            }],
            ..StockTransaction::default()
        })
        .unwrap();

    let report = service.reconcile().unwrap();
    assert_eq!(report.divergences.len(), 1);
    assert_eq!(report.divergences[0].ledger_quantity, Quantity::from(9));

    let rebuilt = service.rebuild_projection().unwrap();
    assert_eq!(rebuilt.repaired.len(), 1);
    assert!(rebuilt.is_complete());
    assert_eq!(stock(&service, "A"), Quantity::from(9));
    assert_ledger_matches_projection(&service);
}

#[test]
fn concurrent_entradas_on_one_key_lose_no_update() {
    let service = setup();
    let threads = 8;
    let per_thread = 25;

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..per_thread {
                    service
                        .apply_movement(movement("A", MovementKind::Entrada, 1, "Compra"))
                        .unwrap();
                }
            });
        }
    });

    let expected = Quantity::from((threads * per_thread) as i64);
    assert_eq!(stock(&service, "A"), expected);
    assert_eq!(history(&service).len(), threads * per_thread);
    assert_eq!(service.stock_entry(&key("A")).unwrap().version, (threads * per_thread) as u64);
    assert_ledger_matches_projection(&service);
}

#[test]
fn concurrent_salidas_never_oversell() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 50, "Compra"))
        .unwrap();

    let accepted = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                for _ in 0..20 {
                    match service.apply_movement(movement("A", MovementKind::Salida, 1, "Venta")) {
                        Ok(_) => {
                            accepted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                        Err(StockError::InsufficientStock { .. }) => {}
                        Err(other) => panic!("unexpected error {other:?}"),
                    }
                }
            });
        }
    });

    assert_eq!(accepted.into_inner(), 50);
    assert_eq!(stock(&service, "A"), Quantity::ZERO);
    assert_ledger_matches_projection(&service);
}

#[test]
fn concurrent_transfers_conserve_quantity() {
    let service = setup();
    service
        .apply_movement(movement("A", MovementKind::Entrada, 40, "Compra"))
        .unwrap();
    service
        .apply_movement(movement("B", MovementKind::Entrada, 40, "Compra"))
        .unwrap();

    std::thread::scope(|scope| {
        for i in 0..4 {
            let service = &service;
            scope.spawn(move || {
                let (from, to) = if i % 2 == 0 { ("A", "B") } else { ("B", "A") };
                for _ in 0..15 {
                    match service.transfer(transfer(from, to, 2)) {
                        Ok(_) | Err(StockError::InsufficientStock { .. }) => {}
                        Err(other) => panic!("unexpected error {other:?}"),
                    }
                }
            });
        }
    });

    assert_eq!(
        stock(&service, "A").checked_add(stock(&service, "B")).unwrap(),
        Quantity::from(80)
    );
    assert_ledger_matches_projection(&service);

    let legs = service
        .movement_history(&MovementFilter {
            kind: Some(MovementKind::Transferencia),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(legs.len(), service.list_transfers().unwrap().len() * 2);
}

#[derive(Debug, Clone)]
enum Op {
    Entrada(&'static str, i64),
    Salida(&'static str, i64),
    Transfer(&'static str, &'static str, i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let warehouse = prop_oneof![Just("A"), Just("B")];
    prop_oneof![
        (warehouse.clone(), 1i64..50).prop_map(|(w, q)| Op::Entrada(w, q)),
        (warehouse.clone(), 1i64..50).prop_map(|(w, q)| Op::Salida(w, q)),
        (warehouse, 1i64..50).prop_map(|(w, q)| {
            let to = if w == "A" { "B" } else { "A" };
            Op::Transfer(w, to, q)
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// After any sequence of operations each entry equals its ledger sum, no
    /// entry is negative, and only Entrada/Salida change the product total.
    #[test]
    fn ledger_and_projection_agree_after_any_sequence(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let service = setup();
        let mut expected_total = Quantity::ZERO;

        for op in ops {
            let result = match op {
                Op::Entrada(w, q) => service
                    .apply_movement(movement(w, MovementKind::Entrada, q, "Compra"))
                    .map(|_| Quantity::from(q)),
                Op::Salida(w, q) => service
                    .apply_movement(movement(w, MovementKind::Salida, q, "Venta"))
                    .map(|_| Quantity::from(-q)),
                Op::Transfer(from, to, q) => service
                    .transfer(transfer(from, to, q))
                    .map(|_| Quantity::ZERO),
            };
            match result {
                Ok(change) => expected_total = expected_total.checked_add(change).unwrap(),
                Err(StockError::InsufficientStock { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }

            for w in ["A", "B"] {
                let entry = service.stock_entry(&key(w)).unwrap();
                prop_assert!(!entry.quantity.is_negative());
                prop_assert_eq!(entry.quantity, service.ledger().balance(&key(w)).unwrap());
            }
            prop_assert_eq!(service.total_stock(&p1()).unwrap(), expected_total);
        }
        prop_assert!(service.reconcile().unwrap().is_consistent());
    }
}
