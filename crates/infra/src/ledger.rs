//! Movement Ledger: the append-only kardex.
//!
//! Movements are never written on their own. `record` stages one into the
//! transaction that also carries its stock change, so the ledger and the
//! projection move together or not at all. There is no update or delete.

use uuid::Uuid;

use kardex_core::{MovementId, Quantity};
use kardex_events::{Event, EventEnvelope};
use kardex_inventory::{InventoryEvent, MovementRecord, NewMovement, StockKey};

use crate::service::StockError;
use crate::store::{InventoryStore, MovementFilter, StockTransaction, StoreError};

pub struct MovementLedger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> MovementLedger<'a, S>
where
    S: InventoryStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stage a validated movement; its id is fixed before commit.
    pub fn record(&self, transaction: &mut StockTransaction, movement: NewMovement) -> MovementId {
        let id = movement.id;
        transaction.movements.push(movement);
        id
    }

    pub fn history(&self, filter: &MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        self.store.movements(filter)
    }

    /// Sum of every recorded delta for one (product, warehouse).
    pub fn balance(&self, key: &StockKey) -> Result<Quantity, StockError> {
        let movements = self.store.movements(&MovementFilter::for_key(key))?;
        Ok(Quantity::checked_sum(movements.iter().map(|m| m.quantity))?)
    }
}

/// Wrap a committed fact for publication or replay.
///
/// Movement events reuse the movement id and ledger sequence, so a consumer can
/// drop redeliveries; other facts carry sequence 0.
pub fn envelope(event: InventoryEvent) -> EventEnvelope<InventoryEvent> {
    let event_id = match &event {
        InventoryEvent::MovementRecorded(m) => *m.id.as_uuid(),
        _ => Uuid::now_v7(),
    };
    let sequence = event.ledger_sequence().unwrap_or(0);
    EventEnvelope::new(event_id, event.stream(), sequence, event)
}
