//! Event mechanics shared by the ledger and its consumers.
//!
//! Nothing here knows about inventory: the domain crate defines the concrete
//! event type, infra decides where envelopes are stored and published.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
