//! Serialized relay runtime.
//!
//! The [`DeliveryController`] is not thread-safe by itself; its ordering
//! guarantees depend on every transition running one at a time. [`Relay`]
//! moves the controller into a single tokio task that consumes two
//! channels:
//!
//! - caller commands from any number of [`RelayHandle`] clones
//! - transport notifications from [`TransportEvents`]
//!
//! Subscriber callbacks run on that task. They may call back into a
//! `RelayHandle`; the command is queued and handled after the callback
//! returns.
//!
//! The task stops once every `RelayHandle` has been dropped. A handler that
//! owns a handle keeps the relay alive until it is unregistered.

use crate::config::RelayConfig;
use crate::controller::{DeliveryController, QueueStatus};
use crate::diagnostics::Diagnostics;
use crate::error::{RelayError, RelayResult};
use crate::message::Message;
use crate::registry::{HandlerId, MessageHandler};
use crate::transport::{Transport, TransportEvent, TransportEvents};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

enum Command {
    Enqueue(Message),
    RegisterHandler {
        group: String,
        handler: MessageHandler,
        reply: Option<oneshot::Sender<HandlerId>>,
    },
    UnregisterHandler(HandlerId),
    OpenGate,
    Status(oneshot::Sender<QueueStatus>),
}

/// Cloneable caller surface of a running relay.
///
/// Every method returns immediately; work happens on the relay task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    /// Queue a message for delivery.
    ///
    /// Returns false only if the relay has stopped. A configured maximum
    /// queue depth is enforced on the relay task and reported through
    /// diagnostics.
    pub fn enqueue(
        &self,
        group: impl Into<String>,
        operation: impl Into<String>,
        payload: impl Into<String>,
    ) -> bool {
        self.enqueue_message(Message::new(group, operation, payload))
    }

    /// Queue an already built message.
    pub fn enqueue_message(&self, message: Message) -> bool {
        self.send(Command::Enqueue(message))
    }

    /// Subscribe a callback to inbound messages for `group`.
    pub fn register_handler<F>(&self, group: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.send(Command::RegisterHandler {
            group: group.into(),
            handler: Arc::new(handler),
            reply: None,
        })
    }

    /// Subscribe a callback and wait for its id, for later removal.
    pub async fn subscribe<F>(&self, group: impl Into<String>, handler: F) -> RelayResult<HandlerId>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::RegisterHandler {
            group: group.into(),
            handler: Arc::new(handler),
            reply: Some(reply),
        }) {
            return Err(RelayError::RelayClosed);
        }
        rx.await.map_err(|_| RelayError::RelayClosed)
    }

    /// Remove a subscription created with [`RelayHandle::subscribe`].
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.send(Command::UnregisterHandler(id))
    }

    /// Permit sending.
    pub fn open_gate(&self) -> bool {
        self.send(Command::OpenGate)
    }

    /// Current queue and gate status.
    pub async fn status(&self) -> RelayResult<QueueStatus> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Status(reply)) {
            return Err(RelayError::RelayClosed);
        }
        rx.await.map_err(|_| RelayError::RelayClosed)
    }

    /// Poll until the queue is empty and nothing is in flight.
    ///
    /// Never returns while the gate stays closed or an attempt is stuck;
    /// wrap it in `tokio::time::timeout` when that matters.
    pub async fn wait_drained(&self, poll_interval: Duration) -> RelayResult<QueueStatus> {
        loop {
            let status = self.status().await?;
            if status.pending == 0 && !status.in_flight {
                return Ok(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Whether the relay task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// A running relay.
pub struct Relay {
    handle: RelayHandle,
    task: JoinHandle<()>,
}

impl Relay {
    /// Initialize the relay and start its task.
    ///
    /// Opens the transport, wiring its notifications into the task. A
    /// transport that fails to open is reported to `diagnostics` and the
    /// relay keeps running degraded. Must be called from within a tokio
    /// runtime.
    pub fn start<T: Transport>(
        transport: T,
        config: RelayConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let mut controller = DeliveryController::new(transport, config, diagnostics);

        let (events, events_rx) = TransportEvents::channel();
        if let Err(e) = controller.initialize(events) {
            debug!(error = %e, "Relay starting without an open transport");
        }

        let (tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(controller, commands_rx, events_rx));

        Self {
            handle: RelayHandle { tx },
            task,
        }
    }

    /// A new handle to this relay.
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Drop this relay's own handle and wait for the task to finish.
    ///
    /// Completes once every other handle has been dropped as well.
    pub async fn join(self) {
        let Relay { handle, task } = self;
        drop(handle);
        let _ = task.await;
    }
}

async fn run<T: Transport>(
    mut controller: DeliveryController<T>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    info!("Relay task started");
    let mut events_open = true;

    loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => controller.handle_event(event),
                None => {
                    debug!("Transport event channel closed");
                    events_open = false;
                }
            },
            command = commands.recv() => match command {
                Some(command) => apply(&mut controller, command),
                None => break,
            },
        }
    }

    info!(
        pending = controller.queue().len(),
        "Relay task stopped, all handles dropped"
    );
}

fn apply<T: Transport>(controller: &mut DeliveryController<T>, command: Command) {
    match command {
        Command::Enqueue(message) => {
            controller.enqueue(message);
        }
        Command::RegisterHandler {
            group,
            handler,
            reply,
        } => {
            let id = controller.register_handler(group, handler);
            if let Some(reply) = reply {
                let _ = reply.send(id);
            }
        }
        Command::UnregisterHandler(id) => {
            controller.unregister_handler(id);
        }
        Command::OpenGate => controller.open_gate(),
        Command::Status(reply) => {
            let _ = reply.send(controller.status());
        }
    }
}
