//! Event primitives shared by the workflow and infrastructure crates.
//!
//! Events are facts: immutable, versioned and append-only. The bus carries
//! committed events to read-side consumers (summaries, exports, reporting).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
