//! Message relay simulation driver.
//!
//! Usage: message-relay [--messages <n>] [--auto-arm] [--fail-every <n>]
//!
//! Runs a relay over a simulated link, queues `--messages` messages and
//! waits until every one of them was delivered or dropped. With
//! `--auto-arm` the simulated peer opens the gate by sending a `ctl/hello`
//! frame after `--hello-after-ms`; otherwise the gate is opened directly.

use anyhow::{anyhow, Context};
use clap::Parser;
use message_relay::{
    Diagnostics, Exhaustion, FailurePlan, FailureReason, Message, Relay, RelayConfig, RelayError,
    SimulatedLink, TracingDiagnostics,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Reliable message relay over a simulated single-slot link.
#[derive(Parser, Debug)]
#[command(name = "message-relay")]
#[command(about = "Drive a message relay over a simulated single-slot link")]
struct Args {
    /// Number of messages to enqueue.
    #[arg(long, default_value = "10")]
    messages: u32,

    /// Attempts per message (overrides config and RELAY_RETRY_BUDGET).
    #[arg(long)]
    retry_budget: Option<u8>,

    /// Open the gate when the peer says hello instead of immediately.
    #[arg(long)]
    auto_arm: bool,

    /// Fail every n-th transmission attempt.
    #[arg(long, conflicts_with = "fail_probability")]
    fail_every: Option<u32>,

    /// Fail each transmission attempt with this probability (0.0 - 1.0).
    #[arg(long)]
    fail_probability: Option<f64>,

    /// Seed for --fail-probability.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated link latency per attempt in milliseconds.
    #[arg(long, default_value = "5")]
    latency_ms: u64,

    /// Delay before the simulated peer says hello, in milliseconds.
    #[arg(long, default_value = "100")]
    hello_after_ms: u64,

    /// Give up waiting for the queue to drain after this many seconds.
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// JSON relay config file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write JSONL logs to this file instead of compact stderr output.
    #[arg(long)]
    json_log: Option<PathBuf>,
}

impl Args {
    fn failure_plan(&self) -> FailurePlan {
        match (self.fail_every, self.fail_probability) {
            (Some(n), _) => FailurePlan::EveryNth(n),
            (None, Some(p)) => FailurePlan::Probability(p),
            (None, None) => FailurePlan::Never,
        }
    }
}

/// Counts outcomes on top of the usual log lines.
#[derive(Default)]
struct RunStats {
    delivered: AtomicU64,
    failed_attempts: AtomicU64,
    exhausted: AtomicU64,
    rejected: AtomicU64,
}

impl Diagnostics for RunStats {
    fn transport_open_failed(&self, reason: FailureReason) {
        TracingDiagnostics.transport_open_failed(reason);
    }

    fn attempt_failed(&self, message: &Message, reason: FailureReason, attempts_left: u8) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        TracingDiagnostics.attempt_failed(message, reason, attempts_left);
    }

    fn delivered(&self, message: &Message) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        TracingDiagnostics.delivered(message);
    }

    fn exhausted(&self, report: &Exhaustion) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        TracingDiagnostics.exhausted(report);
    }

    fn rejected(&self, message: &Message) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        TracingDiagnostics.rejected(message);
    }

    fn malformed_inbound(&self, error: &RelayError) {
        TracingDiagnostics.malformed_inbound(error);
    }
}

fn load_config(args: &Args) -> anyhow::Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RelayConfig::new()?,
    };

    if let Some(retry_budget) = args.retry_budget {
        config.retry_budget = retry_budget;
    }
    if args.auto_arm {
        config.auto_arm = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "message-relay".into(),
        default_level: args.log_level.clone(),
        log_path: args.json_log.clone(),
        format: if args.json_log.is_some() {
            observability::LogFormat::Json
        } else {
            observability::LogFormat::Compact
        },
        ..Default::default()
    })?;

    let config = load_config(&args)?;
    let plan = args.failure_plan();
    info!(
        messages = args.messages,
        retry_budget = config.retry_budget,
        auto_arm = config.auto_arm,
        plan = ?plan,
        "Message relay simulation starting"
    );

    let (link, peer) = match args.seed {
        Some(seed) => SimulatedLink::with_seed(plan, seed),
        None => SimulatedLink::new(plan),
    };
    let link = link.latency(Duration::from_millis(args.latency_ms));

    let stats = Arc::new(RunStats::default());
    let relay = Relay::start(link, config.clone(), stats.clone());
    let handle = relay.handle();

    handle.register_handler("ctl", |operation, payload| {
        info!(operation = %operation, payload = %payload, "Peer control message");
    });

    let started = Instant::now();
    for n in 0..args.messages {
        handle.enqueue("sim", "tick", n.to_string());
    }

    if config.auto_arm {
        tokio::time::sleep(Duration::from_millis(args.hello_after_ms)).await;
        peer.send("ctl", "hello", "")?;
    } else {
        handle.open_gate();
    }

    let status = tokio::time::timeout(
        Duration::from_secs(args.timeout_secs),
        handle.wait_drained(Duration::from_millis(10)),
    )
    .await
    .map_err(|_| anyhow!("queue did not drain within {}s", args.timeout_secs))??;

    drop(handle);
    relay.join().await;

    let delivered = stats.delivered.load(Ordering::Relaxed);
    let exhausted = stats.exhausted.load(Ordering::Relaxed);
    info!(
        delivered,
        exhausted,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Message relay simulation finished"
    );

    println!(
        "messages={} delivered={} dropped={} rejected={} failed_attempts={} armed={} elapsed={:?}",
        args.messages,
        delivered,
        exhausted,
        stats.rejected.load(Ordering::Relaxed),
        stats.failed_attempts.load(Ordering::Relaxed),
        status.armed,
        started.elapsed(),
    );

    Ok(())
}
