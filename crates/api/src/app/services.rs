//! Store/bus wiring behind the HTTP handlers.
//!
//! The stock service is synchronous (and the Postgres store blocks on its pool),
//! so handlers reach it through [`AppServices::blocking`].

use std::sync::Arc;

use axum::response::Response;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use kardex_core::{ProductId, Quantity, WarehouseId};
use kardex_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use kardex_infra::{
    InMemoryInventoryStore, MovementFilter, PostgresInventoryStore, QualityApproval,
    RebuildReport, ReconciliationReport, Reservation, RetryPolicy, SaleLine, Settings, StockError, StockService,
    TransferOutcome, WarehouseStock,
};
use kardex_inventory::{
    ApplyMovement, InventoryEvent, MovementRecord, ProductStockCounter, StockEntry, StockKey,
    Transfer, TransferStock, Warehouse, WarehouseDraft, WarehouseStatus,
};

use crate::app::errors;

pub type InventoryBus = Arc<InMemoryEventBus<EventEnvelope<InventoryEvent>>>;

type InMemoryStockService = StockService<Arc<InMemoryInventoryStore>, InventoryBus>;
type PersistentStockService = StockService<Arc<PostgresInventoryStore>, InventoryBus>;

pub enum AppServices {
    InMemory { stock: InMemoryStockService },
    Persistent { stock: PersistentStockService },
}

macro_rules! with_stock {
    ($services:expr, $stock:ident => $body:expr) => {
        match $services {
            AppServices::InMemory { stock: $stock } => $body,
            AppServices::Persistent { stock: $stock } => $body,
        }
    };
}

/// Wire the store selected by `settings` (Postgres when `DATABASE_URL` is set).
pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    let bus: InventoryBus = Arc::new(InMemoryEventBus::new());
    spawn_audit_log(&bus)?;

    let Some(url) = settings.database_url.as_deref() else {
        return Ok(AppServices::in_memory_with_bus(settings.retry, bus));
    };

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    let store = PostgresInventoryStore::new(pool);
    store.ensure_schema().await?;
    info!("using PostgreSQL inventory store");

    Ok(AppServices::Persistent {
        stock: StockService::new(Arc::new(store), bus, settings.retry),
    })
}

/// Log every committed inventory event (the audit trail of the process).
fn spawn_audit_log(bus: &InventoryBus) -> std::io::Result<()> {
    let subscription = bus.subscribe();
    std::thread::Builder::new()
        .name("kardex-audit".to_string())
        .spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                info!(
                    target: "kardex::audit",
                    event_type = envelope.payload().event_type(),
                    stream = envelope.stream(),
                    sequence = envelope.sequence_number(),
                    "inventory event committed"
                );
            }
            warn!(target: "kardex::audit", "event bus closed, audit log stopped");
        })?;
    Ok(())
}

impl AppServices {
    /// In-memory store and bus (dev/test).
    pub fn in_memory(retry: RetryPolicy) -> Self {
        Self::in_memory_with_bus(retry, Arc::new(InMemoryEventBus::new()))
    }

    fn in_memory_with_bus(retry: RetryPolicy, bus: InventoryBus) -> Self {
        AppServices::InMemory {
            stock: StockService::new(Arc::new(InMemoryInventoryStore::new()), bus, retry),
        }
    }

    pub fn bus(&self) -> &InventoryBus {
        with_stock!(self, stock => stock.bus())
    }

    /// Run a stock operation on the blocking pool and map its error to a response.
    pub async fn blocking<T, F>(self: Arc<Self>, op: F) -> Result<T, Response>
    where
        F: FnOnce(&AppServices) -> Result<T, StockError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::task::spawn_blocking(move || op(&self)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(errors::stock_error_to_response(err)),
            Err(join) => Err(errors::internal_error(join.to_string())),
        }
    }

    // Warehouses

    pub fn register_warehouse(&self, draft: WarehouseDraft) -> Result<Warehouse, StockError> {
        with_stock!(self, stock => stock.register_warehouse(draft))
    }

    pub fn update_warehouse(
        &self,
        id: &WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<Warehouse, StockError> {
        with_stock!(self, stock => stock.update_warehouse(id, draft))
    }

    pub fn set_warehouse_status(
        &self,
        id: &WarehouseId,
        status: WarehouseStatus,
    ) -> Result<Warehouse, StockError> {
        with_stock!(self, stock => stock.set_warehouse_status(id, status))
    }

    pub fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StockError> {
        with_stock!(self, stock => stock.remove_warehouse(id))
    }

    pub fn get_warehouse(&self, id: &WarehouseId) -> Result<Warehouse, StockError> {
        with_stock!(self, stock => stock.get_warehouse(id))
    }

    pub fn list_warehouses(&self) -> Result<Vec<Warehouse>, StockError> {
        with_stock!(self, stock => stock.list_warehouses())
    }

    // Stock reads

    pub fn stock_entry(&self, key: &StockKey) -> Result<StockEntry, StockError> {
        with_stock!(self, stock => stock.stock_entry(key))
    }

    pub fn total_stock(&self, product_id: &ProductId) -> Result<Quantity, StockError> {
        with_stock!(self, stock => stock.total_stock(product_id))
    }

    pub fn warehouse_stock(&self, id: &WarehouseId) -> Result<WarehouseStock, StockError> {
        with_stock!(self, stock => stock.warehouse_stock(id))
    }

    pub fn list_stock(&self) -> Result<Vec<StockEntry>, StockError> {
        with_stock!(self, stock => stock.list_stock())
    }

    pub fn movement_history(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StockError> {
        with_stock!(self, stock => stock.movement_history(filter))
    }

    pub fn list_transfers(&self) -> Result<Vec<Transfer>, StockError> {
        with_stock!(self, stock => stock.list_transfers())
    }

    pub fn global_stock(&self, product_id: &ProductId) -> Result<ProductStockCounter, StockError> {
        with_stock!(self, stock => stock.global_stock(product_id))
    }

    // Stock-affecting operations

    pub fn apply_movement(&self, command: ApplyMovement) -> Result<MovementRecord, StockError> {
        with_stock!(self, stock => stock.apply_movement(command))
    }

    pub fn transfer(&self, command: TransferStock) -> Result<TransferOutcome, StockError> {
        with_stock!(self, stock => stock.transfer(command))
    }

    pub fn adjust_global_stock(
        &self,
        product_id: &ProductId,
        delta: Decimal,
    ) -> Result<ProductStockCounter, StockError> {
        with_stock!(self, stock => stock.adjust_global_stock(product_id, delta))
    }

    pub fn complete_sale(&self, sale: SaleLine) -> Result<MovementRecord, StockError> {
        with_stock!(self, stock => stock.complete_sale(sale))
    }

    pub fn approve_quality_control(
        &self,
        approval: QualityApproval,
    ) -> Result<Option<MovementRecord>, StockError> {
        with_stock!(self, stock => stock.approve_quality_control(approval))
    }

    pub fn reserve(&self, reservation: Reservation) -> Result<MovementRecord, StockError> {
        with_stock!(self, stock => stock.reserve(reservation))
    }

    pub fn release(&self, reservation: Reservation) -> Result<MovementRecord, StockError> {
        with_stock!(self, stock => stock.release(reservation))
    }

    // Reconciliation

    pub fn reconcile(&self) -> Result<ReconciliationReport, StockError> {
        with_stock!(self, stock => stock.reconcile())
    }

    pub fn rebuild_projection(&self) -> Result<RebuildReport, StockError> {
        with_stock!(self, stock => stock.rebuild_projection())
    }
}
