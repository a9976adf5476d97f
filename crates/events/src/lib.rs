//! Event mechanics shared by the sales domain and its adapters.
//!
//! Nothing here knows what a sale is. Domain crates implement [`Event`] for
//! their own event types, wrap them in an [`EventEnvelope`] and hand them to an
//! [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
