//! Message relay: reliable delivery over a single-slot asynchronous link.
//!
//! Callers enqueue `(group, operation, payload)` messages; the relay sends
//! them one at a time in enqueue order, retries failed attempts up to a
//! fixed budget and dispatches inbound messages to subscribers by group.
//!
//! # Core Invariants
//!
//! 1. **One In-Flight**: at most one transmission is outstanding
//! 2. **FIFO**: messages leave the queue strictly in enqueue order
//! 3. **Bounded Retry**: a message is attempted at most `retry_budget` times
//! 4. **Gated**: nothing is sent until the gate opens, explicitly or on the
//!    first inbound message when auto-arm is enabled
//!
//! # Architecture
//!
//! ```text
//! RelayHandle --commands--> relay task --begin_send/send--> Transport
//!                               ^                               |
//!                               |___ Sent / Failed / Received __|
//! ```

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod message;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod sim;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::RelayConfig;
pub use controller::{DeliveryController, DeliveryState, QueueStatus};
pub use diagnostics::{Diagnostics, Exhaustion, TracingDiagnostics};
pub use error::{RelayError, RelayResult};
pub use message::{Fields, Message, KEY_GROUP, KEY_OPERATION, KEY_PAYLOAD};
pub use queue::{EntryHandle, DEFAULT_RETRY_BUDGET};
pub use registry::{HandlerId, MessageHandler};
pub use relay::{Relay, RelayHandle};
pub use sim::{FailurePlan, SimulatedLink, SimulatedPeer};
pub use transport::{AttemptId, FailureReason, Transport, TransportEvent, TransportEvents};
