use chrono::{DateTime, Utc};

/// A committed fact, published only after the store accepted it.
///
/// Facts are immutable and never retracted; a correction is a new fact.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name (e.g. "inventory.movement.recorded").
    fn event_type(&self) -> &'static str;

    /// Schema version of the payload.
    fn version(&self) -> u32;

    /// Stream the fact belongs to (e.g. `stock/{product}/{warehouse}`).
    fn stream(&self) -> String;

    /// Position in the append-only ledger, for facts that live there.
    fn ledger_sequence(&self) -> Option<u64> {
        None
    }

    /// When the fact was committed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
