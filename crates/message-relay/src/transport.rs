//! Transport boundary.
//!
//! The relay rides on a transport that carries one outbound dictionary at a
//! time and reports the outcome of each attempt later, out of band. The
//! transport also delivers inbound dictionaries. Both kinds of notification
//! are pushed through [`TransportEvents`], which feeds the relay task.
//!
//! ```text
//! relay --begin_send/send--> transport
//!   ^                            |
//!   |__ Sent / Failed / Received_|
//! ```

use crate::message::Fields;
use std::fmt;
use tokio::sync::mpsc;

/// Numeric result code for a successful transport call.
pub const RESULT_OK: i32 = 0;

/// Why a transport call or transmission attempt failed.
///
/// The relay treats every reason identically (retry or exhaust) but keeps
/// it for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The peer did not acknowledge in time.
    SendTimeout,
    /// The peer rejected the message.
    SendRejected,
    /// No link to the peer.
    NotConnected,
    /// The peer application is not running.
    PeerNotRunning,
    /// The transport rejected the arguments.
    InvalidArgs,
    /// Another transmission is still in progress.
    Busy,
    /// The dictionary did not fit into the transport buffer.
    BufferOverflow,
    /// The buffer was already released.
    AlreadyReleased,
    /// A callback was registered twice.
    CallbackAlreadyRegistered,
    /// A callback was missing.
    CallbackNotRegistered,
    /// The transport ran out of memory.
    OutOfMemory,
    /// The transport is closed.
    Closed,
    /// Internal transport error.
    InternalError,
    /// Code outside the known table.
    Unknown(i32),
}

impl FailureReason {
    /// Map a numeric transport result code to a failure reason.
    ///
    /// Returns `None` for [`RESULT_OK`].
    pub fn from_code(code: i32) -> Option<Self> {
        let reason = match code {
            RESULT_OK => return None,
            2 => Self::SendTimeout,
            4 => Self::SendRejected,
            8 => Self::NotConnected,
            16 => Self::PeerNotRunning,
            32 => Self::InvalidArgs,
            64 => Self::Busy,
            128 => Self::BufferOverflow,
            512 => Self::AlreadyReleased,
            1024 => Self::CallbackAlreadyRegistered,
            2048 => Self::CallbackNotRegistered,
            4096 => Self::OutOfMemory,
            8192 => Self::Closed,
            16384 => Self::InternalError,
            other => Self::Unknown(other),
        };
        Some(reason)
    }

    /// Turn a numeric result code into a `Result`.
    pub fn check(code: i32) -> Result<(), Self> {
        match Self::from_code(code) {
            None => Ok(()),
            Some(reason) => Err(reason),
        }
    }

    /// Canonical upper-snake name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendTimeout => "SEND_TIMEOUT",
            Self::SendRejected => "SEND_REJECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::PeerNotRunning => "PEER_NOT_RUNNING",
            Self::InvalidArgs => "INVALID_ARGS",
            Self::Busy => "BUSY",
            Self::BufferOverflow => "BUFFER_OVERFLOW",
            Self::AlreadyReleased => "ALREADY_RELEASED",
            Self::CallbackAlreadyRegistered => "CALLBACK_ALREADY_REGISTERED",
            Self::CallbackNotRegistered => "CALLBACK_NOT_REGISTERED",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::Closed => "CLOSED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "{} ({})", self.as_str(), code),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Handle for a single transmission attempt, issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Notification delivered by the transport after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The attempt was delivered.
    Sent(AttemptId),
    /// The attempt failed.
    Failed(AttemptId, FailureReason),
    /// An inbound dictionary arrived.
    Received(Fields),
}

/// Sender half the transport uses to report completions and inbound data.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEvents {
    /// Create a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report a confirmed delivery. Returns false once the relay is gone.
    pub fn sent(&self, attempt: AttemptId) -> bool {
        self.emit(TransportEvent::Sent(attempt))
    }

    /// Report a failed attempt. Returns false once the relay is gone.
    pub fn failed(&self, attempt: AttemptId, reason: FailureReason) -> bool {
        self.emit(TransportEvent::Failed(attempt, reason))
    }

    /// Report an inbound dictionary. Returns false once the relay is gone.
    pub fn received(&self, fields: Fields) -> bool {
        self.emit(TransportEvent::Received(fields))
    }

    /// Push a raw event.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Single-slot asynchronous transport.
///
/// Implementations must deliver exactly one `Sent` or `Failed` event per
/// attempt accepted by [`Transport::send`]. An attempt rejected
/// synchronously (an `Err` from `begin_send` or `send`) must not also be
/// reported through [`TransportEvents`].
pub trait Transport: Send + 'static {
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;

    /// Open the transport and keep `events` for later notifications.
    ///
    /// A size of 0 asks for the transport maximum.
    fn open(
        &mut self,
        events: TransportEvents,
        inbox_size: usize,
        outbox_size: usize,
    ) -> Result<(), FailureReason>;

    /// Reserve the outbound slot for a new attempt.
    fn begin_send(&mut self) -> Result<AttemptId, FailureReason>;

    /// Transmit `fields` on the slot reserved by `begin_send`.
    fn send(&mut self, attempt: AttemptId, fields: Fields) -> Result<(), FailureReason>;
}
