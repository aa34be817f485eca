use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a committed event, carrying its stream and ordering metadata.
///
/// Notes:
/// - `stream` names the record the event belongs to (e.g. `stock/{product}/{warehouse}`).
/// - `sequence_number` is the position in the append-only ledger, strictly
///   increasing across all streams. Envelopes can still arrive out of order, so
///   consumers deduplicate on `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream: String,

    /// Monotonically increasing position in the ledger.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(event_id: Uuid, stream: impl Into<String>, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id,
            stream: stream.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
