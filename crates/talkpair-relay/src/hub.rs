//! The hub: the single task that owns the coordinator.
//!
//! Socket tasks never touch pairing state. They send `HubCommand`s through a
//! `HubHandle`; the hub applies them one at a time, then fans the resulting
//! notifications out to per-connection outbound queues without waiting. A
//! connection too slow to take a notice that changes its pairing state is
//! disconnected rather than left with a stale view.

use std::collections::HashMap;

use talkpair_common::{ConnectionId, RelayError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::coordinator::{Coordinator, CoordinatorStats, Outbound, Recipient};
use crate::protocol::ClientCommand;

/// Capacity of the hub's inbound command queue.
const COMMAND_QUEUE: usize = 1024;

/// Events processed by the hub, in arrival order.
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        id: ConnectionId,
        outbox: mpsc::Sender<String>,
    },
    Client {
        id: ConnectionId,
        command: ClientCommand,
    },
    Disconnect {
        id: ConnectionId,
    },
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
}

/// Cloneable sender side of the hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Register a new socket and the queue its notifications go to.
    pub async fn connect(
        &self,
        id: ConnectionId,
        outbox: mpsc::Sender<String>,
    ) -> Result<(), RelayError> {
        self.send(HubCommand::Connect { id, outbox }).await
    }

    pub async fn command(&self, id: ConnectionId, command: ClientCommand) -> Result<(), RelayError> {
        self.send(HubCommand::Client { id, command }).await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.send(HubCommand::Disconnect { id }).await
    }

    /// Current occupancy, answered in order with other commands.
    pub async fn stats(&self) -> Result<CoordinatorStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    async fn send(&self, command: HubCommand) -> Result<(), RelayError> {
        self.tx.send(command).await.map_err(|_| RelayError::HubClosed)
    }
}

/// Spawn the hub task. It runs until every `HubHandle` is dropped.
pub fn spawn(coordinator: Coordinator) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let hub = Hub {
        coordinator,
        outboxes: HashMap::new(),
        rx,
    };
    (HubHandle { tx }, tokio::spawn(hub.run()))
}

struct Hub {
    coordinator: Coordinator,
    outboxes: HashMap<ConnectionId, mpsc::Sender<String>>,
    rx: mpsc::Receiver<HubCommand>,
}

impl Hub {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            self.apply(command);
        }
        debug!("Hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { id, outbox } => {
                self.outboxes.insert(id, outbox);
                let out = self.coordinator.connect(id);
                self.deliver(out);
            }
            HubCommand::Client { id, command } => {
                let out = self.coordinator.handle(id, command);
                self.deliver(out);
            }
            HubCommand::Disconnect { id } => {
                let out = self.coordinator.disconnect(id);
                self.outboxes.remove(&id);
                self.deliver(out);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.coordinator.stats());
            }
        }
    }

    /// Fan notices out. A connection that cannot take a state-carrying notice
    /// is evicted: its outbox is dropped (ending its socket task) and it is
    /// torn down like any disconnect, which may produce further notices.
    fn deliver(&mut self, mut out: Vec<Outbound>) {
        while !out.is_empty() {
            let mut stalled: Vec<ConnectionId> = Vec::new();
            for Outbound { to, notice } in out {
                let json = match notice.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode notice");
                        continue;
                    }
                };
                let targets: Vec<ConnectionId> = match to {
                    Recipient::One(id) => vec![id],
                    Recipient::All => self.outboxes.keys().copied().collect(),
                };
                for id in targets {
                    if stalled.contains(&id) {
                        continue;
                    }
                    if self.push(id, json.clone()) == Push::Full && !notice.is_droppable() {
                        stalled.push(id);
                    }
                }
            }

            out = Vec::new();
            for id in stalled {
                if self.outboxes.remove(&id).is_some() {
                    warn!(conn = %id, "Outbound queue full, evicting connection");
                    out.extend(self.coordinator.disconnect(id));
                }
            }
        }
    }

    fn push(&self, id: ConnectionId, json: String) -> Push {
        let Some(outbox) = self.outboxes.get(&id) else {
            return Push::Gone;
        };
        match outbox.try_send(json) {
            Ok(()) => Push::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(conn = %id, "Outbound queue full");
                Push::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn = %id, "Outbound queue closed, notice dropped");
                Push::Gone
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Push {
    Queued,
    Full,
    /// Unknown id or a socket task that already exited; its own disconnect
    /// is on the way.
    Gone,
}
