//! Scenario tests for the message relay.
//!
//! - `harness.rs`  - FakeTransport, RecordingDiagnostics and a controller fixture
//! - `ordering.rs` - FIFO delivery and the single outbound slot
//! - `retry.rs`    - retry budget, exhaustion and degraded transports
//! - `gate.rs`     - send gate and auto-arm
//! - `dispatch.rs` - inbound dispatch to subscribers
//! - `relay.rs`    - the async relay task over fake and simulated links

mod dispatch;
mod gate;
