//! Diagnostics collaborator.
//!
//! The relay never surfaces transport problems to `enqueue` callers. Instead
//! every noteworthy event is reported here. [`TracingDiagnostics`] logs them;
//! applications that need a "delivery abandoned" hook supply their own
//! implementation.

use crate::error::RelayError;
use crate::message::Message;
use crate::transport::FailureReason;
use tracing::{debug, error, warn};

/// Report for a message dropped after its attempts ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhaustion {
    /// The message that was never delivered.
    pub message: Message,
    /// Attempts issued before giving up.
    pub attempts: u8,
    /// Failure reported for the final attempt, if any.
    pub last_reason: Option<FailureReason>,
}

/// Receiver for relay diagnostics. Every method defaults to a no-op.
pub trait Diagnostics: Send + Sync {
    /// The transport could not be opened; the relay keeps running degraded.
    fn transport_open_failed(&self, _reason: FailureReason) {}

    /// A transmission attempt failed and may be retried.
    fn attempt_failed(&self, _message: &Message, _reason: FailureReason, _attempts_left: u8) {}

    /// A message was confirmed delivered.
    fn delivered(&self, _message: &Message) {}

    /// A message was dropped after its attempts ran out.
    fn exhausted(&self, _report: &Exhaustion) {}

    /// A message was refused because the queue is full.
    fn rejected(&self, _message: &Message) {}

    /// An inbound dictionary could not be parsed and was discarded.
    fn malformed_inbound(&self, _error: &RelayError) {}
}

/// Diagnostics that only log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn transport_open_failed(&self, reason: FailureReason) {
        error!(reason = %reason, "Transport open failed, continuing degraded");
    }

    fn attempt_failed(&self, message: &Message, reason: FailureReason, attempts_left: u8) {
        debug!(
            group = %message.group(),
            operation = %message.operation(),
            payload = %message.payload(),
            reason = %reason,
            attempts_left,
            "ERROR"
        );
    }

    fn delivered(&self, message: &Message) {
        debug!(
            group = %message.group(),
            operation = %message.operation(),
            payload = %message.payload(),
            "SENT"
        );
    }

    fn exhausted(&self, report: &Exhaustion) {
        warn!(
            group = %report.message.group(),
            operation = %report.message.operation(),
            payload = %report.message.payload(),
            attempts = report.attempts,
            last_reason = report.last_reason.map(|r| r.as_str()).unwrap_or("none"),
            "Message dropped after retries exhausted"
        );
    }

    fn rejected(&self, message: &Message) {
        warn!(
            group = %message.group(),
            operation = %message.operation(),
            "Queue full, message rejected"
        );
    }

    fn malformed_inbound(&self, error: &RelayError) {
        warn!(error = %error, "Discarding inbound message");
    }
}
