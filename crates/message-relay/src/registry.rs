//! Subscriber registry keyed by group.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Subscriber callback: receives `(operation, payload)`.
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Identifies a registration so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

struct Registration {
    id: HandlerId,
    handler: MessageHandler,
}

/// Ordered subscribers per group.
///
/// Registering the same callback twice makes it fire twice per message.
#[derive(Default)]
pub struct HandlerRegistry {
    groups: HashMap<String, Vec<Registration>>,
    next_id: u64,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the subscribers of `group`.
    pub fn register(&mut self, group: impl Into<String>, handler: MessageHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.groups
            .entry(group.into())
            .or_default()
            .push(Registration { id, handler });
        id
    }

    /// Remove a single registration. Returns false if it was unknown.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        self.groups.retain(|_, registrations| {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
            !registrations.is_empty()
        });
        removed
    }

    /// Invoke every subscriber of `group` in registration order.
    ///
    /// Returns the number of callbacks invoked; an unknown group is a no-op.
    pub fn dispatch(&self, group: &str, operation: &str, payload: &str) -> usize {
        let Some(registrations) = self.groups.get(group) else {
            trace!(group = %group, "No handlers for group");
            return 0;
        };

        for registration in registrations {
            (registration.handler)(operation, payload);
        }
        registrations.len()
    }

    /// Number of registrations for `group`.
    pub fn handler_count(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, Vec::len)
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .groups
            .iter()
            .map(|(group, registrations)| (group.as_str(), registrations.len()))
            .collect();
        f.debug_struct("HandlerRegistry")
            .field("groups", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &CallLog, tag: &'static str) -> MessageHandler {
        let log = log.clone();
        Arc::new(move |operation, payload| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}:{}", tag, operation, payload));
        })
    }

    #[test]
    fn test_registry_new() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = CallLog::default();
        let mut registry = HandlerRegistry::new();
        registry.register("T", recorder(&log, "first"));
        registry.register("T", recorder(&log, "second"));

        let invoked = registry.dispatch("T", "op", "data");

        assert_eq!(invoked, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:op:data".to_string(), "second:op:data".to_string()]
        );
    }

    #[test]
    fn test_dispatch_does_not_cross_groups() {
        let log = CallLog::default();
        let mut registry = HandlerRegistry::new();
        registry.register("T", recorder(&log, "t"));
        registry.register("U", recorder(&log, "u"));

        registry.dispatch("T", "op", "1");

        assert_eq!(*log.lock().unwrap(), vec!["t:op:1".to_string()]);
    }

    #[test]
    fn test_unknown_group_is_noop() {
        let log = CallLog::default();
        let mut registry = HandlerRegistry::new();
        registry.register("T", recorder(&log, "t"));

        assert_eq!(registry.dispatch("missing", "op", ""), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_fires_twice() {
        let log = CallLog::default();
        let handler = recorder(&log, "dup");
        let mut registry = HandlerRegistry::new();
        registry.register("T", handler.clone());
        registry.register("T", handler);

        registry.dispatch("T", "op", "x");

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(registry.handler_count("T"), 2);
    }

    #[test]
    fn test_unregister_removes_only_that_registration() {
        let log = CallLog::default();
        let mut registry = HandlerRegistry::new();
        let first = registry.register("T", recorder(&log, "first"));
        registry.register("T", recorder(&log, "second"));

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first));

        registry.dispatch("T", "op", "x");
        assert_eq!(*log.lock().unwrap(), vec!["second:op:x".to_string()]);
    }

    #[test]
    fn test_unregister_last_handler_drops_group() {
        let mut registry = HandlerRegistry::new();
        let id = registry.register("T", Arc::new(|_, _| {}));

        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert_eq!(registry.handler_count("T"), 0);
    }
}
