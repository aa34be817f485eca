//! Postgres-backed inventory store.
//!
//! Stock levels, the kardex ledger, transfers, the product counter and the
//! warehouse directory live in five tables. A commit runs in one transaction:
//!
//! 1. every stock / counter change is written with a version guard
//!    (`UPDATE ... WHERE version = $n`, or `INSERT ... ON CONFLICT DO NOTHING`
//!    for a first write); zero affected rows means another writer got there first
//! 2. movements are inserted; `BIGSERIAL` assigns the ledger sequence
//! 3. the transfer row is inserted
//!
//! Any failure rolls the whole transaction back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Backend` |
//! | Database (serialization failure) | `40001` | `Concurrency` |
//! | Database (other) | Any other | `Backend` |
//! | ColumnDecode / Decode | N/A | `Serialization` |
//! | Other | N/A | `Backend` |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use kardex_core::{MovementId, ProductId, Quantity, TransferId, WarehouseId};
use kardex_inventory::{
    CounterChange, MovementKind, MovementRecord, ProductStockCounter, StockChange, StockEntry,
    StockKey, Transfer, TransferStatus, Warehouse, WarehouseStatus,
};

use super::r#trait::{
    CommitReceipt, EntryScope, InventoryStore, MovementFilter, StockTransaction, StoreError,
    WarehouseDirectory,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS warehouses (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        address     TEXT NOT NULL DEFAULT '',
        responsible TEXT NOT NULL DEFAULT '',
        phone       TEXT NOT NULL DEFAULT '',
        notes       TEXT NOT NULL DEFAULT '',
        status      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_entries (
        product_id   TEXT NOT NULL,
        warehouse_id TEXT NOT NULL,
        quantity     NUMERIC NOT NULL CHECK (quantity >= 0),
        version      BIGINT NOT NULL CHECK (version > 0),
        updated_at   TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (product_id, warehouse_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movements (
        sequence     BIGSERIAL PRIMARY KEY,
        id           UUID NOT NULL UNIQUE,
        product_id   TEXT NOT NULL,
        warehouse_id TEXT NOT NULL,
        kind         TEXT NOT NULL,
        quantity     NUMERIC NOT NULL CHECK (quantity <> 0),
        reason       TEXT NOT NULL,
        reference    TEXT NOT NULL,
        date         DATE NOT NULL,
        lot          TEXT,
        serial       TEXT,
        expiry       DATE,
        transfer_id  UUID,
        recorded_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS movements_product_warehouse_idx
        ON movements (product_id, warehouse_id, sequence)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfers (
        id                       UUID PRIMARY KEY,
        product_id               TEXT NOT NULL,
        source_warehouse_id      TEXT NOT NULL,
        destination_warehouse_id TEXT NOT NULL,
        quantity                 NUMERIC NOT NULL CHECK (quantity > 0),
        reason                   TEXT NOT NULL,
        reference                TEXT NOT NULL,
        date                     DATE NOT NULL,
        status                   TEXT NOT NULL,
        created_at               TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_stock (
        product_id TEXT PRIMARY KEY,
        quantity   NUMERIC NOT NULL CHECK (quantity >= 0),
        version    BIGINT NOT NULL CHECK (version > 0)
    )
    "#,
];

/// Postgres-backed inventory store.
///
/// The storage traits are synchronous; each call is driven to completion with
/// `Handle::block_on`, so callers must be on a blocking thread that has a tokio
/// runtime context (e.g. inside `tokio::task::spawn_blocking`).
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %key.stream()), err)]
    pub async fn fetch_entry(&self, key: &StockKey) -> Result<StockEntry, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, version, updated_at
            FROM stock_entries
            WHERE product_id = $1 AND warehouse_id = $2
            "#,
        )
        .bind(key.product_id.as_str())
        .bind(key.warehouse_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_entry", e))?;

        match row {
            Some(row) => entry_from_row(&row),
            None => Ok(StockEntry::empty(key.clone())),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_entries(&self, scope: &EntryScope) -> Result<Vec<StockEntry>, StoreError> {
        let (product, warehouse) = match scope {
            EntryScope::All => (None, None),
            EntryScope::Product(p) => (Some(p.as_str()), None),
            EntryScope::Warehouse(w) => (None, Some(w.as_str())),
        };
        let rows = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, version, updated_at
            FROM stock_entries
            WHERE ($1::text IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR warehouse_id = $2)
            ORDER BY product_id, warehouse_id
            "#,
        )
        .bind(product)
        .bind(warehouse)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Apply a transaction atomically. See the module docs for the steps.
    #[instrument(
        skip(self, transaction),
        fields(
            stock_changes = transaction.stock.len(),
            counter_changes = transaction.counters.len(),
            movements = transaction.movements.len(),
            committed_movements = tracing::field::Empty
        ),
        err
    )]
    pub async fn commit_transaction(
        &self,
        transaction: StockTransaction,
    ) -> Result<CommitReceipt, StoreError> {
        if transaction.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let now = Utc::now();
        let mut receipt = CommitReceipt::default();

        for change in &transaction.stock {
            receipt.entries.push(write_stock(&mut tx, change, now).await?);
        }
        for change in &transaction.counters {
            receipt.counters.push(write_counter(&mut tx, change).await?);
        }

        for movement in transaction.movements {
            let row = sqlx::query(
                r#"
                INSERT INTO movements (
                    id, product_id, warehouse_id, kind, quantity, reason, reference,
                    date, lot, serial, expiry, transfer_id, recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING sequence
                "#,
            )
            .bind(*movement.id.as_uuid())
            .bind(movement.product_id.as_str())
            .bind(movement.warehouse_id.as_str())
            .bind(movement.kind.label())
            .bind(movement.quantity.as_decimal())
            .bind(&movement.details.reason)
            .bind(&movement.details.reference)
            .bind(movement.details.date)
            .bind(movement.details.lot.as_deref())
            .bind(movement.details.serial.as_deref())
            .bind(movement.details.expiry)
            .bind(movement.transfer_id.map(|t| *t.as_uuid()))
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;

            let sequence: i64 = row
                .try_get("sequence")
                .map_err(|e| map_sqlx_error("insert_movement", e))?;
            receipt.movements.push(movement.into_record(sequence as u64, now));
        }

        if let Some(transfer) = transaction.transfer {
            sqlx::query(
                r#"
                INSERT INTO transfers (
                    id, product_id, source_warehouse_id, destination_warehouse_id,
                    quantity, reason, reference, date, status, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(*transfer.id.as_uuid())
            .bind(transfer.product_id.as_str())
            .bind(transfer.source_warehouse_id.as_str())
            .bind(transfer.destination_warehouse_id.as_str())
            .bind(transfer.quantity.as_decimal())
            .bind(&transfer.reason)
            .bind(&transfer.reference)
            .bind(transfer.date)
            .bind(transfer_status_label(transfer.status))
            .bind(transfer.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transfer", e))?;
            receipt.transfer = Some(transfer);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_movements", receipt.movements.len());
        Ok(receipt)
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<Vec<MovementRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, product_id, warehouse_id, kind, quantity, reason, reference,
                   date, lot, serial, expiry, transfer_id, recorded_at
            FROM movements
            WHERE ($1::text IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR warehouse_id = $2)
              AND ($3::text IS NULL OR kind = $3)
              AND ($4::uuid IS NULL OR transfer_id = $4)
              AND ($5::text IS NULL OR lower(btrim(reason)) = lower(btrim($5)))
            ORDER BY sequence ASC
            "#,
        )
        .bind(filter.product_id.as_ref().map(|p| p.as_str()))
        .bind(filter.warehouse_id.as_ref().map(|w| w.as_str()))
        .bind(filter.kind.map(|k| k.label()))
        .bind(filter.transfer_id.map(|t| *t.as_uuid()))
        .bind(filter.reason.as_deref())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_movements", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = movement_from_row(row)?;
            // Free-text search shares the in-memory matcher.
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, source_warehouse_id, destination_warehouse_id, quantity,
                   reason, reference, date, status, created_at
            FROM transfers
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_transfers", e))?;

        rows.iter().map(transfer_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_counter(
        &self,
        product_id: &ProductId,
    ) -> Result<ProductStockCounter, StoreError> {
        let row = sqlx::query("SELECT quantity, version FROM product_stock WHERE product_id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_counter", e))?;

        let Some(row) = row else {
            return Ok(ProductStockCounter::empty(product_id.clone()));
        };
        let quantity: Decimal = row.try_get("quantity").map_err(decode_error)?;
        let version: i64 = row.try_get("version").map_err(decode_error)?;
        Ok(ProductStockCounter {
            product_id: product_id.clone(),
            quantity: Quantity::new(quantity),
            version: version as u64,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_warehouse(&self, id: &WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, address, responsible, phone, notes, status, created_at, updated_at
            FROM warehouses WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_warehouse", e))?;

        row.as_ref().map(warehouse_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, responsible, phone, notes, status, created_at, updated_at
            FROM warehouses ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_warehouses", e))?;

        rows.iter().map(warehouse_from_row).collect()
    }

    #[instrument(skip(self, warehouse), fields(warehouse_id = %warehouse.id), err)]
    pub async fn upsert_warehouse(&self, warehouse: &Warehouse, insert: bool) -> Result<(), StoreError> {
        let statement = if insert {
            r#"
            INSERT INTO warehouses (id, name, address, responsible, phone, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#
        } else {
            r#"
            UPDATE warehouses
            SET name = $2, address = $3, responsible = $4, phone = $5, notes = $6,
                status = $7, created_at = $8, updated_at = $9
            WHERE id = $1
            "#
        };
        let result = sqlx::query(statement)
            .bind(warehouse.id.as_str())
            .bind(&warehouse.name)
            .bind(&warehouse.address)
            .bind(&warehouse.responsible)
            .bind(&warehouse.phone)
            .bind(&warehouse.notes)
            .bind(warehouse_status_label(warehouse.status))
            .bind(warehouse.created_at)
            .bind(warehouse.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| match map_sqlx_error("upsert_warehouse", e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("warehouse '{}' already exists", warehouse.id))
                }
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("warehouse '{}'", warehouse.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_warehouse(&self, id: &WarehouseId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_warehouse", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("warehouse '{id}'")));
        }
        Ok(())
    }

    fn block_on<F, T>(&self, future: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StoreError::Backend(
                "PostgresInventoryStore requires a tokio runtime context (call from spawn_blocking)"
                    .to_string(),
            )
        })?;
        handle.block_on(future)
    }
}

async fn write_stock(
    tx: &mut Transaction<'_, Postgres>,
    change: &StockChange,
    now: DateTime<Utc>,
) -> Result<StockEntry, StoreError> {
    let result = if change.expected_version == 0 {
        sqlx::query(
            r#"
            INSERT INTO stock_entries (product_id, warehouse_id, quantity, version, updated_at)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(change.key.product_id.as_str())
        .bind(change.key.warehouse_id.as_str())
        .bind(change.quantity.as_decimal())
        .bind(now)
        .execute(&mut **tx)
        .await
    } else {
        sqlx::query(
            r#"
            UPDATE stock_entries
            SET quantity = $3, version = version + 1, updated_at = $4
            WHERE product_id = $1 AND warehouse_id = $2 AND version = $5
            "#,
        )
        .bind(change.key.product_id.as_str())
        .bind(change.key.warehouse_id.as_str())
        .bind(change.quantity.as_decimal())
        .bind(now)
        .bind(change.expected_version as i64)
        .execute(&mut **tx)
        .await
    };
    let result = result.map_err(|e| map_sqlx_error("write_stock", e))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Concurrency(format!(
            "{}: expected version {}",
            change.key.stream(),
            change.expected_version
        )));
    }

    Ok(StockEntry {
        product_id: change.key.product_id.clone(),
        warehouse_id: change.key.warehouse_id.clone(),
        quantity: change.quantity,
        version: change.expected_version + 1,
        updated_at: Some(now),
    })
}

async fn write_counter(
    tx: &mut Transaction<'_, Postgres>,
    change: &CounterChange,
) -> Result<ProductStockCounter, StoreError> {
    let result = if change.expected_version == 0 {
        sqlx::query(
            r#"
            INSERT INTO product_stock (product_id, quantity, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (product_id) DO NOTHING
            "#,
        )
        .bind(change.product_id.as_str())
        .bind(change.quantity.as_decimal())
        .execute(&mut **tx)
        .await
    } else {
        sqlx::query(
            r#"
            UPDATE product_stock
            SET quantity = $2, version = version + 1
            WHERE product_id = $1 AND version = $3
            "#,
        )
        .bind(change.product_id.as_str())
        .bind(change.quantity.as_decimal())
        .bind(change.expected_version as i64)
        .execute(&mut **tx)
        .await
    };
    let result = result.map_err(|e| map_sqlx_error("write_counter", e))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Concurrency(format!(
            "product/{}: expected version {}",
            change.product_id, change.expected_version
        )));
    }

    Ok(ProductStockCounter {
        product_id: change.product_id.clone(),
        quantity: change.quantity,
        version: change.expected_version + 1,
    })
}

impl InventoryStore for PostgresInventoryStore {
    fn load_entry(&self, key: &StockKey) -> Result<StockEntry, StoreError> {
        self.block_on(self.fetch_entry(key))
    }

    fn entries(&self, scope: &EntryScope) -> Result<Vec<StockEntry>, StoreError> {
        self.block_on(self.fetch_entries(scope))
    }

    fn commit(&self, transaction: StockTransaction) -> Result<CommitReceipt, StoreError> {
        self.block_on(self.commit_transaction(transaction))
    }

    fn movements(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        self.block_on(self.fetch_movements(filter))
    }

    fn transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        self.block_on(self.fetch_transfers())
    }

    fn load_counter(&self, product_id: &ProductId) -> Result<ProductStockCounter, StoreError> {
        self.block_on(self.fetch_counter(product_id))
    }
}

impl WarehouseDirectory for PostgresInventoryStore {
    fn get_warehouse(&self, id: &WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        self.block_on(self.fetch_warehouse(id))
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        self.block_on(self.fetch_warehouses())
    }

    fn insert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        self.block_on(self.upsert_warehouse(&warehouse, true))
    }

    fn update_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        self.block_on(self.upsert_warehouse(&warehouse, false))
    }

    fn remove_warehouse(&self, id: &WarehouseId) -> Result<(), StoreError> {
        self.block_on(self.delete_warehouse(id))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Serialization(format!("{operation}: {err}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    map_sqlx_error("decode_row", err)
}

fn parse<T, E: core::fmt::Display>(value: Result<T, E>) -> Result<T, StoreError> {
    value.map_err(|e| StoreError::Serialization(e.to_string()))
}

fn entry_from_row(row: &PgRow) -> Result<StockEntry, StoreError> {
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let warehouse_id: String = row.try_get("warehouse_id").map_err(decode_error)?;
    let quantity: Decimal = row.try_get("quantity").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode_error)?;
    Ok(StockEntry {
        product_id: parse(ProductId::new(product_id))?,
        warehouse_id: parse(WarehouseId::new(warehouse_id))?,
        quantity: Quantity::new(quantity),
        version: version as u64,
        updated_at: Some(updated_at),
    })
}

fn movement_from_row(row: &PgRow) -> Result<MovementRecord, StoreError> {
    let sequence: i64 = row.try_get("sequence").map_err(decode_error)?;
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let warehouse_id: String = row.try_get("warehouse_id").map_err(decode_error)?;
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    let quantity: Decimal = row.try_get("quantity").map_err(decode_error)?;
    let transfer_id: Option<Uuid> = row.try_get("transfer_id").map_err(decode_error)?;
    Ok(MovementRecord {
        id: MovementId::from_uuid(id),
        sequence: sequence as u64,
        product_id: parse(ProductId::new(product_id))?,
        warehouse_id: parse(WarehouseId::new(warehouse_id))?,
        kind: parse(kind.parse::<MovementKind>())?,
        quantity: Quantity::new(quantity),
        reason: row.try_get("reason").map_err(decode_error)?,
        reference: row.try_get("reference").map_err(decode_error)?,
        date: row.try_get::<NaiveDate, _>("date").map_err(decode_error)?,
        lot: row.try_get("lot").map_err(decode_error)?,
        serial: row.try_get("serial").map_err(decode_error)?,
        expiry: row.try_get("expiry").map_err(decode_error)?,
        transfer_id: transfer_id.map(TransferId::from_uuid),
        recorded_at: row.try_get("recorded_at").map_err(decode_error)?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<Transfer, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let source: String = row.try_get("source_warehouse_id").map_err(decode_error)?;
    let destination: String = row.try_get("destination_warehouse_id").map_err(decode_error)?;
    let quantity: Decimal = row.try_get("quantity").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    Ok(Transfer {
        id: TransferId::from_uuid(id),
        product_id: parse(ProductId::new(product_id))?,
        source_warehouse_id: parse(WarehouseId::new(source))?,
        destination_warehouse_id: parse(WarehouseId::new(destination))?,
        quantity: Quantity::new(quantity),
        reason: row.try_get("reason").map_err(decode_error)?,
        reference: row.try_get("reference").map_err(decode_error)?,
        date: row.try_get("date").map_err(decode_error)?,
        status: parse_transfer_status(&status)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
    })
}

fn warehouse_from_row(row: &PgRow) -> Result<Warehouse, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    Ok(Warehouse {
        id: parse(WarehouseId::new(id))?,
        name: row.try_get("name").map_err(decode_error)?,
        address: row.try_get("address").map_err(decode_error)?,
        responsible: row.try_get("responsible").map_err(decode_error)?,
        phone: row.try_get("phone").map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
        status: parse_warehouse_status(&status)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

fn warehouse_status_label(status: WarehouseStatus) -> &'static str {
    match status {
        WarehouseStatus::Active => "Activo",
        WarehouseStatus::Inactive => "Inactivo",
    }
}

fn parse_warehouse_status(raw: &str) -> Result<WarehouseStatus, StoreError> {
    match raw {
        "Activo" => Ok(WarehouseStatus::Active),
        "Inactivo" => Ok(WarehouseStatus::Inactive),
        other => Err(StoreError::Serialization(format!("unknown warehouse status '{other}'"))),
    }
}

fn transfer_status_label(status: TransferStatus) -> &'static str {
    match status {
        TransferStatus::Completed => "Completada",
    }
}

fn parse_transfer_status(raw: &str) -> Result<TransferStatus, StoreError> {
    match raw {
        "Completada" => Ok(TransferStatus::Completed),
        other => Err(StoreError::Serialization(format!("unknown transfer status '{other}'"))),
    }
}
