//! Configuration for the relay.

use crate::error::{RelayError, RelayResult};
use crate::queue::DEFAULT_RETRY_BUDGET;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Total transmission attempts per message.
    pub retry_budget: u8,

    /// Open the gate automatically on the first inbound message.
    pub auto_arm: bool,

    /// Start with the gate already open.
    pub start_armed: bool,

    /// Inbound buffer size requested from the transport (0 = maximum).
    pub inbox_size: usize,

    /// Outbound buffer size requested from the transport (0 = maximum).
    pub outbox_size: usize,

    /// Optional cap on queued messages; `enqueue` refuses beyond it.
    pub max_queue_depth: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            auto_arm: false,
            start_armed: false,
            inbox_size: 0,
            outbox_size: 0,
            max_queue_depth: None,
        }
    }
}

impl RelayConfig {
    /// Create a config with default values, then override from environment.
    pub fn new() -> RelayResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Config with the given auto-arm policy and default everything else.
    pub fn with_auto_arm(auto_arm: bool) -> Self {
        Self {
            auto_arm,
            ..Self::default()
        }
    }

    /// Config with explicit transport buffer sizes.
    pub fn with_buffer_sizes(auto_arm: bool, inbox_size: usize, outbox_size: usize) -> Self {
        Self {
            auto_arm,
            inbox_size,
            outbox_size,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load_from_file(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> RelayResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the relay cannot honour.
    pub fn validate(&self) -> RelayResult<()> {
        if self.retry_budget == 0 {
            return Err(RelayError::Config(
                "retry_budget must allow at least one attempt".to_string(),
            ));
        }
        if self.max_queue_depth == Some(0) {
            return Err(RelayError::Config(
                "max_queue_depth must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> RelayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RELAY_RETRY_BUDGET") {
            self.retry_budget = parse_number("RELAY_RETRY_BUDGET", &value)?;
        }
        if let Some(value) = lookup("RELAY_AUTO_ARM") {
            self.auto_arm = parse_flag("RELAY_AUTO_ARM", &value)?;
        }
        if let Some(value) = lookup("RELAY_START_ARMED") {
            self.start_armed = parse_flag("RELAY_START_ARMED", &value)?;
        }
        if let Some(value) = lookup("RELAY_INBOX_SIZE") {
            self.inbox_size = parse_number("RELAY_INBOX_SIZE", &value)?;
        }
        if let Some(value) = lookup("RELAY_OUTBOX_SIZE") {
            self.outbox_size = parse_number("RELAY_OUTBOX_SIZE", &value)?;
        }
        if let Some(value) = lookup("RELAY_MAX_QUEUE_DEPTH") {
            self.max_queue_depth = Some(parse_number("RELAY_MAX_QUEUE_DEPTH", &value)?);
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> RelayResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("{} is not a valid number: {:?}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> RelayResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RelayError::Config(format!(
            "{} is not a valid flag: {:?}",
            key, value
        ))),
    }
}
