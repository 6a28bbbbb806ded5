//! Send gate: decides whether queued messages may be transmitted.
//!
//! The gate starts closed unless configured otherwise. It opens either
//! explicitly or, with auto-arm enabled, after the first inbound message.
//! It never closes again.

/// Outbound permission state plus the auto-arm policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendGate {
    armed: bool,
    auto_arm: bool,
}

impl SendGate {
    /// Create a gate.
    pub fn new(auto_arm: bool, start_armed: bool) -> Self {
        Self {
            armed: start_armed,
            auto_arm,
        }
    }

    /// Whether sending is permitted.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether the auto-arm policy is configured.
    pub fn auto_arm(&self) -> bool {
        self.auto_arm
    }

    /// Permit sending. Returns true if the gate was closed before.
    pub fn open(&mut self) -> bool {
        let was_closed = !self.armed;
        self.armed = true;
        was_closed
    }

    /// Whether an inbound message should open the gate now.
    pub fn should_auto_arm(&self) -> bool {
        self.auto_arm && !self.armed
    }
}
