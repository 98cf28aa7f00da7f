//! Token actors and the bus endpoint that routes frames to them.
//!
//! Every token has one actor; it is spawned on first contact and hydrated
//! from storage lazily. Replies are pushed to the outbound channel as
//! [`Envelope`]s addressed back to the requester.

mod messages;
mod token;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::Id;
use crate::sync::WorkflowContext;

pub use messages::{
    Command, Coordinates, Envelope, MessageError, Reply, CREATE_TOKEN, DELETE_TOKEN,
    SYNCHRONIZE_TOKEN,
};
use token::{Inbound, TokenActor};

/// Bus region served by the importer of `tenant`.
pub fn region_for(tenant: &str) -> String {
    format!("BondsterImport/{tenant}")
}

/// State shared between the system and its actors.
pub(crate) struct Shared {
    pub(crate) ctx: Arc<WorkflowContext>,
    pub(crate) region: String,
    outbound: mpsc::UnboundedSender<Envelope>,
    workflows: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn reply(&self, to: &Coordinates, from: Coordinates, reply: Reply) {
        let envelope = Envelope {
            to: to.clone(),
            from,
            payload: reply.code().to_string(),
        };
        debug!(to = %envelope.to, reply = %reply, "Replying");
        if self.outbound.send(envelope).is_err() {
            warn!(to = %to, "Outbound channel closed, reply dropped");
        }
    }

    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        let mut workflows = match self.workflows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        workflows.retain(|h| !h.is_finished());
        workflows.push(handle);
    }

    fn take_workflows(&self) -> Vec<JoinHandle<()>> {
        let mut workflows = match self.workflows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *workflows)
    }
}

pub struct ActorSystem {
    shared: Arc<Shared>,
    actors: Mutex<HashMap<Id, mpsc::UnboundedSender<Inbound>>>,
    shutdown: watch::Receiver<bool>,
}

impl ActorSystem {
    pub fn new(
        ctx: Arc<WorkflowContext>,
        outbound: mpsc::UnboundedSender<Envelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let region = region_for(&ctx.tenant);
        Self {
            shared: Arc::new(Shared {
                ctx,
                region,
                outbound,
                workflows: Mutex::new(Vec::new()),
            }),
            actors: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn region(&self) -> &str {
        &self.shared.region
    }

    /// Routes one raw bus frame. Frames without full addressing and frames
    /// for another region are dropped.
    pub fn deliver(&self, frame: &str) {
        let envelope = match Envelope::parse(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "Dropping unreadable frame");
                return;
            }
        };
        if envelope.to.region != self.shared.region {
            warn!(to = %envelope.to, "Frame addressed to another region");
            return;
        }
        self.process_message(&envelope.payload, &envelope.to.name, envelope.from);
    }

    /// Dispatches a payload addressed to the token named `to_name`. Payloads
    /// that cannot be understood are answered with `EE`.
    pub fn process_message(&self, payload: &str, to_name: &str, from: Coordinates) {
        let receiver = Coordinates::new(self.shared.region.clone(), to_name);
        let command = match Command::parse(payload) {
            Ok(command) => command,
            Err(err) => {
                warn!(to = %receiver, from = %from, error = %err, "Invalid message");
                self.shared.reply(&from, receiver, Reply::Error);
                return;
            }
        };
        let id = match Id::from_string_checked(to_name) {
            Ok(id) => id,
            Err(err) => {
                warn!(to = %receiver, error = %err, "Invalid token id");
                self.shared.reply(&from, receiver, Reply::Error);
                return;
            }
        };
        self.send(&id, Inbound::Remote { command, from });
    }

    /// Asks the actor of `id` to start a synchronization round. The request
    /// comes from the importer itself, so nobody is waiting for a reply.
    pub fn synchronize(&self, id: &Id) {
        let from = Coordinates::new(self.shared.region.clone(), "scheduler");
        self.send(
            id,
            Inbound::Remote {
                command: Command::SynchronizeToken,
                from,
            },
        );
    }

    fn send(&self, id: &Id, message: Inbound) {
        let mut actors = match self.actors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut message = message;
        // an actor stops on shutdown; respawn once if its inbox is closed
        for _ in 0..2 {
            let inbox = actors
                .entry(id.clone())
                .or_insert_with(|| TokenActor::spawn(id.clone(), self.shared.clone(), self.shutdown.clone()));
            match inbox.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    actors.remove(id);
                    message = returned;
                }
            }
        }
        warn!(token = %id, "Actor unavailable, message dropped");
    }

    /// Waits until every actor has handled the messages sent to it so far.
    pub async fn settle(&self) {
        let pending: Vec<oneshot::Receiver<()>> = {
            let actors = match self.actors.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            actors
                .values()
                .filter_map(|inbox| {
                    let (tx, rx) = oneshot::channel();
                    inbox.send(Inbound::Barrier(tx)).ok().map(|_| rx)
                })
                .collect()
        };
        for done in pending {
            let _ = done.await;
        }
    }

    /// Waits for every running workflow to finish.
    pub async fn drain(&self) {
        let workflows = self.shared.take_workflows();
        debug!(count = workflows.len(), "Draining workflows");
        for handle in workflows {
            if let Err(err) = handle.await {
                warn!(error = %err, "Workflow task failed");
            }
        }
    }
}
