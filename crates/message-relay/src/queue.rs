//! Outbound queue with per-entry retry bookkeeping.

use crate::message::Message;
use crate::transport::FailureReason;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// Default number of transmission attempts per message.
pub const DEFAULT_RETRY_BUDGET: u8 = 2;

/// Identifies an entry for the lifetime of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(pub u64);

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// A message waiting for delivery.
#[derive(Debug, Clone)]
pub struct QueuedEntry {
    handle: EntryHandle,
    message: Message,
    retry_budget: u8,
    attempts_left: u8,
    last_failure: Option<FailureReason>,
    enqueued_at: DateTime<Utc>,
}

impl QueuedEntry {
    /// Handle assigned at enqueue time.
    pub fn handle(&self) -> EntryHandle {
        self.handle
    }

    /// The queued message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Attempts still allowed before the entry is exhausted.
    pub fn attempts_left(&self) -> u8 {
        self.attempts_left
    }

    /// Attempts already issued.
    pub fn attempts_made(&self) -> u8 {
        self.retry_budget - self.attempts_left
    }

    /// Reason reported for the most recent failed attempt.
    pub fn last_failure(&self) -> Option<FailureReason> {
        self.last_failure
    }

    /// When the entry was enqueued.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Whether the entry has no attempts left.
    pub fn is_exhausted(&self) -> bool {
        self.attempts_left == 0
    }

    /// Consume the entry, keeping only the message.
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// FIFO of pending entries.
///
/// Only the head is ever transmitted, retried or dropped. Every head
/// operation is a no-op on an empty queue.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedEntry>,
    next_sequence: u64,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail with `retry_budget` attempts.
    pub fn enqueue(&mut self, message: Message, retry_budget: u8) -> EntryHandle {
        self.next_sequence += 1;
        let handle = EntryHandle(self.next_sequence);

        debug!(
            entry = %handle,
            group = %message.group(),
            operation = %message.operation(),
            payload = %message.payload(),
            "ADDING"
        );

        self.entries.push_back(QueuedEntry {
            handle,
            message,
            retry_budget,
            attempts_left: retry_budget,
            last_failure: None,
            enqueued_at: Utc::now(),
        });

        handle
    }

    /// Look at the head entry without removing it.
    pub fn peek_head(&self) -> Option<&QueuedEntry> {
        self.entries.front()
    }

    /// Remove the head after a confirmed delivery.
    pub fn consume_head_as_sent(&mut self) -> Option<QueuedEntry> {
        self.entries.pop_front()
    }

    /// Remove the head after its attempts ran out.
    pub fn consume_head_as_exhausted(&mut self) -> Option<QueuedEntry> {
        self.entries.pop_front()
    }

    /// Spend one attempt on the head entry and return what is left.
    pub fn decrement_head_attempts(&mut self) -> Option<u8> {
        let head = self.entries.front_mut()?;
        head.attempts_left = head.attempts_left.saturating_sub(1);
        Some(head.attempts_left)
    }

    /// Remember why the head's latest attempt failed.
    pub fn record_head_failure(&mut self, reason: FailureReason) {
        if let Some(head) = self.entries.front_mut() {
            head.last_failure = Some(reason);
        }
    }

    /// Number of entries, including the one in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedEntry> {
        self.entries.iter()
    }
}
