use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are disposable: they can be dropped and rebuilt by replaying the
/// ledger from the first envelope. The stored stock table is one such read model,
/// and the reconciliation routine rebuilds a second copy to compare against it.
///
/// ## Idempotency
///
/// Envelopes may be delivered more than once, and envelopes from concurrent
/// publishers may arrive out of sequence order. Implementations remember which
/// `event_id`s they applied and ignore repeats; a sequence high-water mark alone
/// would drop a late envelope.
pub trait Projection {
    type Ev: Event;

    /// Apply a single envelope to the read model.
    ///
    /// Events that are irrelevant to this projection are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);

    /// Highest sequence number applied so far (0 if none). Informational only.
    fn position(&self) -> u64;
}
