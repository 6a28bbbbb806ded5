//! Send gate tests.
//!
//! Covers:
//! - nothing is transmitted while the gate is closed
//! - opening the gate serves the queue immediately
//! - auto-arm opens the gate on the first well-formed inbound message
//! - subscribers run before auto-arm takes effect

use super::harness::{Harness, Recorded};
use crate::config::RelayConfig;
use crate::message::{Fields, KEY_GROUP, KEY_OPERATION};
use std::sync::{Arc, Mutex};

fn auto_arm() -> RelayConfig {
    RelayConfig::with_auto_arm(true)
}

#[test]
fn nothing_sent_before_gate_opens() {
    let mut h = Harness::new(RelayConfig::default());

    h.enqueue("sync", "push", "a");
    h.enqueue("sync", "push", "b");

    assert!(!h.controller.is_armed());
    assert_eq!(h.transport.attempt_count(), 0);
    assert_eq!(h.pending_payloads(), vec!["a", "b"]);
}

#[test]
fn open_gate_serves_queue() {
    let mut h = Harness::new(RelayConfig::default());
    h.enqueue("sync", "push", "a");
    h.enqueue("sync", "push", "b");

    h.controller.open_gate();

    assert!(h.controller.is_armed());
    assert_eq!(h.transport.sent_payloads(), vec!["a"]);
}

#[test]
fn open_gate_twice_sends_once() {
    let mut h = Harness::new(RelayConfig::default());
    h.enqueue("sync", "push", "a");

    h.controller.open_gate();
    h.controller.open_gate();

    assert_eq!(h.transport.attempt_count(), 1);
}

#[test]
fn open_gate_on_empty_queue_is_harmless() {
    let mut h = Harness::new(RelayConfig::default());
    h.controller.open_gate();

    assert!(h.controller.is_armed());
    assert_eq!(h.transport.send_calls(), 0);
}

#[test]
fn start_armed_sends_without_opening() {
    let mut h = Harness::armed();
    h.enqueue("sync", "push", "a");
    assert_eq!(h.transport.attempt_count(), 1);
}

#[test]
fn hello_auto_arms_and_drains_queue() {
    let mut h = Harness::new(auto_arm());
    let hellos = Arc::new(Mutex::new(Vec::new()));
    let seen = hellos.clone();
    h.controller.register_handler(
        "ctl",
        Arc::new(move |operation: &str, payload: &str| {
            seen.lock()
                .unwrap()
                .push((operation.to_string(), payload.to_string()));
        }),
    );
    h.enqueue("sync", "push", "a");
    h.enqueue("sync", "push", "b");
    assert_eq!(h.transport.attempt_count(), 0);

    h.receive("ctl", "hello", "");

    assert_eq!(
        *hellos.lock().unwrap(),
        vec![("hello".to_string(), String::new())]
    );
    assert!(h.controller.is_armed());
    assert_eq!(h.transport.sent_payloads(), vec!["a"]);

    h.complete_ok();
    h.complete_ok();
    assert_eq!(h.diagnostics.delivered(), vec!["a", "b"]);
}

#[test]
fn inbound_for_unknown_group_still_auto_arms() {
    let mut h = Harness::new(auto_arm());
    h.enqueue("sync", "push", "a");

    h.receive("nobody", "listens", "");

    assert!(h.controller.is_armed());
    assert_eq!(h.transport.attempt_count(), 1);
}

#[test]
fn subscribers_run_before_auto_arm() {
    let mut h = Harness::new(auto_arm());
    h.enqueue("sync", "push", "a");

    let transport = h.transport.clone();
    let attempts_seen = Arc::new(Mutex::new(None));
    let observed = attempts_seen.clone();
    h.controller.register_handler(
        "ctl",
        Arc::new(move |_: &str, _: &str| {
            *observed.lock().unwrap() = Some(transport.attempt_count());
        }),
    );

    h.receive("ctl", "hello", "");

    assert_eq!(*attempts_seen.lock().unwrap(), Some(0));
    assert_eq!(h.transport.attempt_count(), 1);
}

#[test]
fn inbound_without_auto_arm_keeps_gate_closed() {
    let mut h = Harness::new(RelayConfig::default());
    h.enqueue("sync", "push", "a");

    h.receive("ctl", "hello", "");

    assert!(!h.controller.is_armed());
    assert_eq!(h.transport.attempt_count(), 0);
}

#[test]
fn malformed_inbound_does_not_auto_arm() {
    let mut h = Harness::new(auto_arm());
    h.enqueue("sync", "push", "a");

    let mut fields = Fields::new();
    fields.insert(KEY_GROUP, "ctl");
    fields.insert(KEY_OPERATION, "hello");
    h.controller.on_received(fields);

    assert!(!h.controller.is_armed());
    assert_eq!(h.transport.attempt_count(), 0);
    assert_eq!(
        h.diagnostics.calls(),
        vec![Recorded::Malformed(
            "Malformed inbound message: missing payload field".to_string()
        )]
    );
}

#[test]
fn later_inbound_after_arming_changes_nothing() {
    let mut h = Harness::new(auto_arm());
    h.enqueue("sync", "push", "a");

    h.receive("ctl", "hello", "");
    h.receive("ctl", "hello", "");

    assert!(h.controller.is_armed());
    assert_eq!(h.transport.attempt_count(), 1);
}
