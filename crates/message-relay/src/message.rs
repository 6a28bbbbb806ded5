//! Message records and their key/value wire form.
//!
//! The transport moves flat dictionaries keyed by small integers. The relay
//! writes three string fields per message and expects the same three on
//! every inbound dictionary:
//!
//! ```text
//! key 0: group      (subscription channel)
//! key 1: operation  (action within the group)
//! key 2: payload    (opaque data)
//! ```

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dictionary key carrying the group identifier.
pub const KEY_GROUP: u32 = 0;

/// Dictionary key carrying the operation identifier.
pub const KEY_OPERATION: u32 = 1;

/// Dictionary key carrying the payload.
pub const KEY_PAYLOAD: u32 = 2;

/// An immutable message: group, operation and payload.
///
/// Strings are stored as owned values and never truncated; any length limit
/// is enforced by the transport, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    group: String,
    operation: String,
    payload: String,
}

impl Message {
    /// Create a new message.
    pub fn new(
        group: impl Into<String>,
        operation: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            operation: operation.into(),
            payload: payload.into(),
        }
    }

    /// The group (topic) this message belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The operation identifier.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The payload string.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.group, self.operation, self.payload)
    }
}

/// Owned key/value dictionary exchanged with the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<u32, String>);

impl Fields {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a string value under `key`, replacing any previous value.
    pub fn insert(&mut self, key: u32, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// Look up the string stored under `key`.
    pub fn get(&self, key: u32) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Bytes needed to carry the dictionary: a 4-byte key plus the value
    /// and its terminator per entry.
    pub fn encoded_len(&self) -> usize {
        self.0.values().map(|value| 4 + value.len() + 1).sum()
    }

    fn take(&mut self, key: u32, name: &'static str) -> RelayResult<String> {
        self.0
            .remove(&key)
            .ok_or(RelayError::MalformedInbound { missing: name })
    }
}

impl From<&Message> for Fields {
    fn from(message: &Message) -> Self {
        let mut fields = Fields::new();
        fields.insert(KEY_GROUP, message.group.as_str());
        fields.insert(KEY_OPERATION, message.operation.as_str());
        fields.insert(KEY_PAYLOAD, message.payload.as_str());
        fields
    }
}

impl TryFrom<Fields> for Message {
    type Error = RelayError;

    /// Parse an inbound dictionary, failing closed on the first missing key.
    fn try_from(mut fields: Fields) -> RelayResult<Self> {
        let group = fields.take(KEY_GROUP, "group")?;
        let operation = fields.take(KEY_OPERATION, "operation")?;
        let payload = fields.take(KEY_PAYLOAD, "payload")?;
        Ok(Self {
            group,
            operation,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let message = Message::new("sync", "push", "42");
        assert_eq!(message.group(), "sync");
        assert_eq!(message.operation(), "push");
        assert_eq!(message.payload(), "42");
        assert_eq!(message.to_string(), "sync, push, 42");
    }

    #[test]
    fn test_fields_use_fixed_keys() {
        let fields = Fields::from(&Message::new("weather", "update", "{\"t\":21}"));

        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get(KEY_GROUP), Some("weather"));
        assert_eq!(fields.get(KEY_OPERATION), Some("update"));
        assert_eq!(fields.get(KEY_PAYLOAD), Some("{\"t\":21}"));
    }

    #[test]
    fn test_payload_is_not_truncated() {
        let long = "x".repeat(8 * 1024);
        let fields = Fields::from(&Message::new("g", "op", long.clone()));
        let parsed = Message::try_from(fields).unwrap();
        assert_eq!(parsed.payload().len(), long.len());
    }

    #[test]
    fn test_empty_strings_are_valid() {
        let mut fields = Fields::new();
        fields.insert(KEY_GROUP, "ctl");
        fields.insert(KEY_OPERATION, "hello");
        fields.insert(KEY_PAYLOAD, "");

        let message = Message::try_from(fields).unwrap();
        assert_eq!(message.payload(), "");
    }

    #[test]
    fn test_missing_field_fails_closed() {
        let mut fields = Fields::new();
        fields.insert(KEY_GROUP, "ctl");
        fields.insert(KEY_PAYLOAD, "");

        let err = Message::try_from(fields).unwrap_err();
        assert!(matches!(
            err,
            RelayError::MalformedInbound {
                missing: "operation"
            }
        ));
    }

    #[test]
    fn test_missing_group_reported_first() {
        let err = Message::try_from(Fields::new()).unwrap_err();
        assert!(matches!(err, RelayError::MalformedInbound { missing: "group" }));
    }

    #[test]
    fn test_encoded_len_counts_keys_and_terminators() {
        let fields = Fields::from(&Message::new("ab", "c", ""));
        assert_eq!(fields.encoded_len(), (4 + 3) + (4 + 2) + (4 + 1));

        let keys: Vec<u32> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![KEY_GROUP, KEY_OPERATION, KEY_PAYLOAD]);
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let mut fields = Fields::from(&Message::new("a", "b", "c"));
        fields.insert(99, "unrelated");

        let message = Message::try_from(fields).unwrap();
        assert_eq!(message, Message::new("a", "b", "c"));
    }
}
