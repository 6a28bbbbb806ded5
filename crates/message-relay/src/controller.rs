//! Delivery controller: the single-threaded core of the relay.
//!
//! Owns the outbound queue, the handler registry and the send gate, and
//! drives the transport through a two-state machine:
//!
//! ```text
//!             try_advance (armed, head has attempts)
//!   IDLE  ----------------------------------------->  AWAITING_COMPLETION
//!    ^                                                        |
//!    |________________ on_sent / on_failed ___________________|
//! ```
//!
//! `try_advance` runs after every enqueue, every completion and every gate
//! opening. It is the only place a transmission is started, so at most one
//! attempt is ever outstanding and entries leave the queue strictly in
//! insertion order.

use crate::config::RelayConfig;
use crate::diagnostics::{Diagnostics, Exhaustion};
use crate::error::{RelayError, RelayResult};
use crate::gate::SendGate;
use crate::message::{Fields, Message};
use crate::queue::{EntryHandle, OutboundQueue};
use crate::registry::{HandlerId, HandlerRegistry, MessageHandler};
use crate::transport::{AttemptId, FailureReason, Transport, TransportEvent, TransportEvents};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the single outbound slot stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Nothing in flight.
    Idle,
    /// One attempt issued, completion not yet observed.
    AwaitingCompletion(AttemptId),
}

/// Snapshot of the relay's queue and gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Entries waiting, including the one in flight.
    pub pending: usize,
    /// Whether an attempt is outstanding.
    pub in_flight: bool,
    /// Whether sending is permitted.
    pub armed: bool,
    /// Registered subscriber callbacks.
    pub handlers: usize,
}

/// Orchestrates queue, gate, registry and transport.
pub struct DeliveryController<T: Transport> {
    transport: T,
    config: RelayConfig,
    queue: OutboundQueue,
    registry: HandlerRegistry,
    gate: SendGate,
    state: DeliveryState,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<T: Transport> DeliveryController<T> {
    /// Create a controller. The transport is not opened until [`initialize`].
    ///
    /// [`initialize`]: DeliveryController::initialize
    pub fn new(transport: T, config: RelayConfig, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let gate = SendGate::new(config.auto_arm, config.start_armed);
        Self {
            transport,
            config,
            queue: OutboundQueue::new(),
            registry: HandlerRegistry::new(),
            gate,
            state: DeliveryState::Idle,
            diagnostics,
        }
    }

    /// Open the transport and hand it the notification sink.
    ///
    /// A failure is reported to diagnostics and returned, but the controller
    /// stays usable: later attempts simply fail and exhaust.
    pub fn initialize(&mut self, events: TransportEvents) -> RelayResult<()> {
        let result = self
            .transport
            .open(events, self.config.inbox_size, self.config.outbox_size);

        match result {
            Ok(()) => {
                info!(
                    transport = self.transport.name(),
                    inbox_size = self.config.inbox_size,
                    outbox_size = self.config.outbox_size,
                    auto_arm = self.gate.auto_arm(),
                    "Transport opened"
                );
                Ok(())
            }
            Err(reason) => {
                self.diagnostics.transport_open_failed(reason);
                Err(RelayError::TransportOpen(reason))
            }
        }
    }

    /// Queue a message with the configured retry budget.
    ///
    /// Returns false only when a maximum queue depth is configured and
    /// reached.
    pub fn enqueue(&mut self, message: Message) -> bool {
        self.enqueue_with_budget(message, self.config.retry_budget)
            .is_some()
    }

    /// Queue a message with an explicit retry budget.
    pub fn enqueue_with_budget(&mut self, message: Message, retry_budget: u8) -> Option<EntryHandle> {
        if let Some(max_depth) = self.config.max_queue_depth {
            if self.queue.len() >= max_depth {
                self.diagnostics.rejected(&message);
                return None;
            }
        }

        let handle = self.queue.enqueue(message, retry_budget);
        self.try_advance();
        Some(handle)
    }

    /// Subscribe `handler` to inbound messages for `group`.
    pub fn register_handler(&mut self, group: impl Into<String>, handler: MessageHandler) -> HandlerId {
        self.registry.register(group, handler)
    }

    /// Remove a subscription.
    pub fn unregister_handler(&mut self, id: HandlerId) -> bool {
        self.registry.unregister(id)
    }

    /// Permit sending and serve the queue.
    pub fn open_gate(&mut self) {
        if self.gate.open() {
            info!(pending = self.queue.len(), "Sending enabled");
        }
        self.try_advance();
    }

    /// Route a transport notification to its handler.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Sent(attempt) => self.on_sent(attempt),
            TransportEvent::Failed(attempt, reason) => self.on_failed(attempt, reason),
            TransportEvent::Received(fields) => self.on_received(fields),
        }
    }

    /// The transport confirmed `attempt`.
    pub fn on_sent(&mut self, attempt: AttemptId) {
        if !self.complete(attempt) {
            return;
        }

        if let Some(entry) = self.queue.consume_head_as_sent() {
            self.diagnostics.delivered(entry.message());
        }
        self.try_advance();
    }

    /// The transport reported `attempt` as failed.
    ///
    /// The head stays queued with its already spent attempt.
    pub fn on_failed(&mut self, attempt: AttemptId, reason: FailureReason) {
        if !self.complete(attempt) {
            return;
        }

        self.note_failure(reason);
        self.try_advance();
    }

    /// An inbound dictionary arrived.
    ///
    /// Subscribers run before the auto-arm policy, so they observe the gate
    /// as it was before this message.
    pub fn on_received(&mut self, fields: Fields) {
        let message = match Message::try_from(fields) {
            Ok(message) => message,
            Err(e) => {
                self.diagnostics.malformed_inbound(&e);
                return;
            }
        };

        debug!(
            group = %message.group(),
            operation = %message.operation(),
            payload = %message.payload(),
            "RECEIVED"
        );

        self.registry
            .dispatch(message.group(), message.operation(), message.payload());

        if self.gate.should_auto_arm() {
            self.open_gate();
        }
    }

    /// Serve the head of the queue if the gate and the slot allow it.
    ///
    /// Drains already exhausted entries without sending them. A synchronous
    /// transport rejection counts as a failed attempt and is handled in the
    /// same pass.
    pub fn try_advance(&mut self) {
        loop {
            if !self.gate.is_armed() {
                return;
            }
            if let DeliveryState::AwaitingCompletion(_) = self.state {
                return;
            }

            let Some(head) = self.queue.peek_head() else {
                return;
            };

            if head.is_exhausted() {
                self.drop_exhausted_head();
                continue;
            }

            let fields = Fields::from(head.message());
            debug!(
                entry = %head.handle(),
                group = %head.message().group(),
                operation = %head.message().operation(),
                payload = %head.message().payload(),
                attempts_left = head.attempts_left(),
                "SENDING"
            );

            self.queue.decrement_head_attempts();

            match self.transmit(fields) {
                Ok(attempt) => {
                    debug!(attempt = %attempt, "Attempt issued");
                    self.state = DeliveryState::AwaitingCompletion(attempt);
                    return;
                }
                Err(reason) => {
                    debug!(reason = %reason, "Transport rejected attempt");
                    self.note_failure(reason);
                }
            }
        }
    }

    /// Current state of the outbound slot.
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Whether sending is permitted.
    pub fn is_armed(&self) -> bool {
        self.gate.is_armed()
    }

    /// Read-only view of the queue.
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Snapshot of queue and gate.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.queue.len(),
            in_flight: matches!(self.state, DeliveryState::AwaitingCompletion(_)),
            armed: self.gate.is_armed(),
            handlers: self.registry.len(),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn transmit(&mut self, fields: Fields) -> Result<AttemptId, FailureReason> {
        let attempt = self.transport.begin_send()?;
        self.transport.send(attempt, fields)?;
        Ok(attempt)
    }

    /// Leave AWAITING_COMPLETION if `attempt` is the one in flight.
    fn complete(&mut self, attempt: AttemptId) -> bool {
        match self.state {
            DeliveryState::AwaitingCompletion(current) if current == attempt => {
                self.state = DeliveryState::Idle;
                true
            }
            state => {
                warn!(
                    attempt = %attempt,
                    state = ?state,
                    "Ignoring completion for an attempt that is not in flight"
                );
                false
            }
        }
    }

    fn note_failure(&mut self, reason: FailureReason) {
        self.queue.record_head_failure(reason);
        if let Some(head) = self.queue.peek_head() {
            self.diagnostics
                .attempt_failed(head.message(), reason, head.attempts_left());
        }
    }

    fn drop_exhausted_head(&mut self) {
        if let Some(entry) = self.queue.consume_head_as_exhausted() {
            let report = Exhaustion {
                attempts: entry.attempts_made(),
                last_reason: entry.last_failure(),
                message: entry.into_message(),
            };
            self.diagnostics.exhausted(&report);
        }
    }
}
