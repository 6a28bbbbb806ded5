//! In-process simulated transport.
//!
//! [`SimulatedLink`] behaves like a single-slot radio link: it accepts one
//! attempt at a time and reports the outcome later from a spawned tokio
//! task. Which attempts fail is decided by a [`FailurePlan`]. The paired
//! [`SimulatedPeer`] plays the remote side and can push inbound frames.

use crate::error::{RelayError, RelayResult};
use crate::message::{Fields, Message};
use crate::transport::{AttemptId, FailureReason, Transport, TransportEvents};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, trace};

/// Which attempts the link fails.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FailurePlan {
    /// Deliver everything.
    #[default]
    Never,
    /// Fail every n-th attempt (1-based). `EveryNth(0)` never fails.
    EveryNth(u32),
    /// Fail every attempt.
    Always,
    /// Fail each attempt with the given probability, clamped to `0.0..=1.0`.
    Probability(f64),
}

/// Simulated single-slot transport.
pub struct SimulatedLink {
    plan: FailurePlan,
    failure_reason: FailureReason,
    latency: Duration,
    events: Arc<OnceLock<TransportEvents>>,
    outbox_size: usize,
    reserved: Option<AttemptId>,
    next_attempt: u64,
    attempts: u64,
    rng: StdRng,
}

impl SimulatedLink {
    /// Create a link and the peer handle that shares it.
    pub fn new(plan: FailurePlan) -> (Self, SimulatedPeer) {
        Self::with_rng(plan, StdRng::from_entropy())
    }

    /// Like [`SimulatedLink::new`], with a seeded generator for
    /// [`FailurePlan::Probability`].
    pub fn with_seed(plan: FailurePlan, seed: u64) -> (Self, SimulatedPeer) {
        Self::with_rng(plan, StdRng::seed_from_u64(seed))
    }

    fn with_rng(plan: FailurePlan, rng: StdRng) -> (Self, SimulatedPeer) {
        let events = Arc::new(OnceLock::new());
        let link = Self {
            plan,
            failure_reason: FailureReason::SendTimeout,
            latency: Duration::ZERO,
            events: events.clone(),
            outbox_size: 0,
            reserved: None,
            next_attempt: 0,
            attempts: 0,
            rng,
        };
        (link, SimulatedPeer { events })
    }

    /// Delay before each completion is reported.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reason reported for planned failures. Defaults to `SEND_TIMEOUT`.
    pub fn failure_reason(mut self, reason: FailureReason) -> Self {
        self.failure_reason = reason;
        self
    }

    /// Attempts accepted so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    fn should_fail(&mut self) -> bool {
        match self.plan {
            FailurePlan::Never => false,
            FailurePlan::Always => true,
            FailurePlan::EveryNth(0) => false,
            FailurePlan::EveryNth(n) => self.attempts % u64::from(n) == 0,
            FailurePlan::Probability(p) => self.rng.gen_bool(p.clamp(0.0, 1.0)),
        }
    }
}

impl Transport for SimulatedLink {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(
        &mut self,
        events: TransportEvents,
        inbox_size: usize,
        outbox_size: usize,
    ) -> Result<(), FailureReason> {
        self.events
            .set(events)
            .map_err(|_| FailureReason::CallbackAlreadyRegistered)?;
        self.outbox_size = outbox_size;
        debug!(inbox_size, outbox_size, "Simulated link open");
        Ok(())
    }

    fn begin_send(&mut self) -> Result<AttemptId, FailureReason> {
        if self.events.get().is_none() {
            return Err(FailureReason::NotConnected);
        }
        if self.reserved.is_some() {
            return Err(FailureReason::Busy);
        }

        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        self.reserved = Some(attempt);
        Ok(attempt)
    }

    fn send(&mut self, attempt: AttemptId, fields: Fields) -> Result<(), FailureReason> {
        if self.reserved != Some(attempt) {
            return Err(FailureReason::InvalidArgs);
        }
        self.reserved = None;

        if self.outbox_size > 0 && fields.encoded_len() > self.outbox_size {
            return Err(FailureReason::BufferOverflow);
        }

        let events = self
            .events
            .get()
            .cloned()
            .ok_or(FailureReason::NotConnected)?;

        self.attempts += 1;
        let outcome = if self.should_fail() {
            Err(self.failure_reason)
        } else {
            Ok(())
        };
        trace!(attempt = %attempt, failed = outcome.is_err(), "Simulated transmission");

        let latency = self.latency;
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match outcome {
                Ok(()) => events.sent(attempt),
                Err(reason) => events.failed(attempt, reason),
            };
        });
        Ok(())
    }
}

/// Remote end of a [`SimulatedLink`].
#[derive(Clone)]
pub struct SimulatedPeer {
    events: Arc<OnceLock<TransportEvents>>,
}

impl SimulatedPeer {
    /// Deliver an inbound message to the relay.
    pub fn send(
        &self,
        group: impl Into<String>,
        operation: impl Into<String>,
        payload: impl Into<String>,
    ) -> RelayResult<()> {
        let message = Message::new(group, operation, payload);
        self.send_fields(Fields::from(&message))
    }

    /// Deliver a raw inbound dictionary, well-formed or not.
    pub fn send_fields(&self, fields: Fields) -> RelayResult<()> {
        let events = self
            .events
            .get()
            .ok_or(RelayError::Transport(FailureReason::NotConnected))?;
        if !events.received(fields) {
            return Err(RelayError::Transport(FailureReason::Closed));
        }
        Ok(())
    }

    /// Whether the link has been opened.
    pub fn is_connected(&self) -> bool {
        self.events.get().is_some()
    }
}
