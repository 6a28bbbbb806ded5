//! Inbound dispatch tests.
//!
//! Covers:
//! - subscribers of a group run in registration order
//! - groups are isolated from each other
//! - dispatch is independent of the outbound queue and gate

use super::harness::Harness;
use crate::config::RelayConfig;
use crate::registry::MessageHandler;
use std::sync::{Arc, Mutex};

type CallLog = Arc<Mutex<Vec<String>>>;

fn recorder(log: &CallLog, tag: &'static str) -> MessageHandler {
    let log = log.clone();
    Arc::new(move |operation: &str, payload: &str| {
        log.lock()
            .unwrap()
            .push(format!("{}:{}:{}", tag, operation, payload));
    })
}

#[test]
fn subscribers_run_in_registration_order() {
    let mut h = Harness::new(RelayConfig::default());
    let log = CallLog::default();
    h.controller.register_handler("T", recorder(&log, "h1"));
    h.controller.register_handler("T", recorder(&log, "h2"));

    h.receive("T", "op", "data");

    assert_eq!(*log.lock().unwrap(), vec!["h1:op:data", "h2:op:data"]);
}

#[test]
fn groups_are_isolated() {
    let mut h = Harness::new(RelayConfig::default());
    let log = CallLog::default();
    h.controller.register_handler("weather", recorder(&log, "w"));
    h.controller.register_handler("sync", recorder(&log, "s"));

    h.receive("weather", "update", "21");
    h.receive("sync", "pull", "");

    assert_eq!(*log.lock().unwrap(), vec!["w:update:21", "s:pull:"]);
}

#[test]
fn unknown_group_is_dropped_quietly() {
    let mut h = Harness::new(RelayConfig::default());
    let log = CallLog::default();
    h.controller.register_handler("T", recorder(&log, "t"));
    h.enqueue("sync", "push", "a");

    h.receive("U", "op", "x");

    assert!(log.lock().unwrap().is_empty());
    assert!(h.diagnostics.calls().is_empty());
    assert_eq!(h.pending_payloads(), vec!["a"]);
}

#[test]
fn same_handler_registered_twice_fires_twice() {
    let mut h = Harness::new(RelayConfig::default());
    let log = CallLog::default();
    let handler = recorder(&log, "dup");
    h.controller.register_handler("T", handler.clone());
    h.controller.register_handler("T", handler);

    h.receive("T", "op", "x");

    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(h.controller.status().handlers, 2);
}

#[test]
fn unregistered_handler_stops_receiving() {
    let mut h = Harness::new(RelayConfig::default());
    let log = CallLog::default();
    let first = h.controller.register_handler("T", recorder(&log, "first"));
    h.controller.register_handler("T", recorder(&log, "second"));

    assert!(h.controller.unregister_handler(first));
    h.receive("T", "op", "x");

    assert_eq!(*log.lock().unwrap(), vec!["second:op:x"]);
}

#[test]
fn dispatch_works_while_in_flight() {
    let mut h = Harness::armed();
    let log = CallLog::default();
    h.controller.register_handler("T", recorder(&log, "t"));
    h.enqueue("sync", "push", "a");
    let in_flight = h.controller.state();

    h.receive("T", "op", "x");

    assert_eq!(*log.lock().unwrap(), vec!["t:op:x"]);
    assert_eq!(h.controller.state(), in_flight);
    assert_eq!(h.transport.attempt_count(), 1);
}
