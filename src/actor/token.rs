use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::models::{Id, Token};
use crate::sync::Workflow;

use super::messages::{Command, Coordinates, Reply};
use super::Shared;

/// Messages drained by a token actor, in arrival order.
#[derive(Debug)]
pub(crate) enum Inbound {
    Remote { command: Command, from: Coordinates },
    /// Self-sent when the workflow of run `generation` ends.
    SyncFinished { generation: u64 },
    /// Answered once every earlier message has been handled.
    Barrier(oneshot::Sender<()>),
}

enum State {
    /// Not loaded yet; hydrated from storage before the next message.
    Nil,
    NonExistent,
    Existing(Token),
    Synchronizing {
        token: Token,
        generation: u64,
        workflow: Arc<Workflow>,
    },
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Nil => "Nil",
            State::NonExistent => "NonExistent",
            State::Existing(_) => "Existing",
            State::Synchronizing { .. } => "Synchronizing",
        }
    }
}

/// Owner of one token's lifecycle. Create, delete and synchronize requests
/// for the token are serialized through its inbox.
pub(crate) struct TokenActor {
    id: Id,
    shared: Arc<Shared>,
    inbox: mpsc::UnboundedSender<Inbound>,
    state: State,
    generation: u64,
}

impl TokenActor {
    /// Spawns the actor task and returns its inbox.
    pub(crate) fn spawn(
        id: Id,
        shared: Arc<Shared>,
        shutdown: watch::Receiver<bool>,
    ) -> mpsc::UnboundedSender<Inbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = TokenActor {
            id,
            shared,
            inbox: tx.clone(),
            state: State::Nil,
            generation: 0,
        };
        tokio::spawn(actor.run(rx, shutdown));
        tx
    }

    fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.shared.region.clone(), self.id.to_string())
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Inbound>, mut shutdown: watch::Receiver<bool>) {
        debug!(token = %self.id, "Actor spawned");
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(token = %self.id, "Actor stopped");
    }

    async fn hydrate(&mut self) {
        self.state = match self.shared.ctx.tokens.load(&self.id).await {
            Ok(Some(token)) => State::Existing(token),
            Ok(None) => State::NonExistent,
            Err(err) => {
                warn!(token = %self.id, error = %format!("{err:#}"), "Failed to hydrate token");
                State::NonExistent
            }
        };
        debug!(token = %self.id, state = self.state.name(), "Hydrated");
    }

    async fn handle(&mut self, message: Inbound) {
        if let Inbound::Barrier(done) = message {
            let _ = done.send(());
            return;
        }
        if matches!(self.state, State::Nil) {
            self.hydrate().await;
        }
        match message {
            Inbound::SyncFinished { generation } => self.on_sync_finished(generation).await,
            Inbound::Remote { command, from } => self.on_command(command, from).await,
            Inbound::Barrier(_) => {}
        }
    }

    fn reply(&self, to: &Coordinates, reply: Reply) {
        self.shared.reply(to, self.coordinates(), reply);
    }

    async fn on_sync_finished(&mut self, generation: u64) {
        match &self.state {
            State::Synchronizing { generation: current, .. } if *current == generation => {
                self.state = State::Nil;
                self.hydrate().await;
            }
            _ => debug!(token = %self.id, generation, "Ignoring stale synchronization result"),
        }
    }

    async fn on_command(&mut self, command: Command, from: Coordinates) {
        let state = std::mem::replace(&mut self.state, State::Nil);
        self.state = match (state, command) {
            (State::NonExistent, Command::CreateToken { username, password }) => {
                let token = Token::new(self.id.clone(), username, password, self.shared.ctx.clock.now());
                match self.shared.ctx.tokens.create(&token).await {
                    Ok(true) => {
                        info!(token = %self.id, "New token created");
                        self.shared.ctx.metrics.token_created();
                        self.reply(&from, Reply::TokenCreated);
                        self.tell_self(Command::SynchronizeToken, from);
                        State::Existing(token)
                    }
                    Ok(false) => {
                        warn!(token = %self.id, "Token record already exists");
                        self.reply(&from, Reply::Error);
                        State::NonExistent
                    }
                    Err(err) => {
                        warn!(token = %self.id, error = %format!("{err:#}"), "Failed to create token");
                        self.reply(&from, Reply::Error);
                        State::NonExistent
                    }
                }
            }
            (State::NonExistent, Command::DeleteToken) => {
                self.reply(&from, Reply::Error);
                State::NonExistent
            }
            (State::NonExistent, Command::SynchronizeToken) => State::NonExistent,

            (State::Existing(token), Command::SynchronizeToken) => self.start_workflow(token),
            (State::Existing(token), Command::DeleteToken) => {
                match self.delete(&from).await {
                    true => State::NonExistent,
                    false => State::Existing(token),
                }
            }

            (
                State::Synchronizing {
                    token,
                    generation,
                    workflow,
                },
                Command::DeleteToken,
            ) => {
                // checkpoints of the running workflow must not resurrect the record
                workflow.abandon().await;
                match self.delete(&from).await {
                    true => State::NonExistent,
                    false => State::Synchronizing {
                        token,
                        generation,
                        workflow,
                    },
                }
            }
            (state @ State::Synchronizing { .. }, Command::SynchronizeToken) => {
                debug!(token = %self.id, "Synchronization already running");
                state
            }

            (state, Command::CreateToken { .. }) => {
                self.reply(&from, Reply::Error);
                state
            }
            (State::Nil, _) => {
                // handle() always hydrates before dispatching
                self.reply(&from, Reply::Error);
                State::Nil
            }
        };
    }

    /// Deletes the record and replies. Returns whether it succeeded.
    async fn delete(&self, from: &Coordinates) -> bool {
        match self.shared.ctx.tokens.delete(&self.id).await {
            Ok(()) => {
                info!(token = %self.id, "Token deleted");
                self.shared.ctx.metrics.token_deleted();
                self.reply(from, Reply::TokenDeleted);
                true
            }
            Err(err) => {
                warn!(token = %self.id, error = %format!("{err:#}"), "Failed to delete token");
                self.reply(from, Reply::Error);
                false
            }
        }
    }

    fn tell_self(&self, command: Command, from: Coordinates) {
        if self.inbox.send(Inbound::Remote { command, from }).is_err() {
            warn!(token = %self.id, "Actor inbox closed");
        }
    }

    fn start_workflow(&mut self, token: Token) -> State {
        self.generation += 1;
        let generation = self.generation;
        let workflow = Arc::new(Workflow::new(self.shared.ctx.clone(), token.clone()));
        let running = workflow.clone();
        let inbox = self.inbox.clone();
        let id = self.id.clone();

        debug!(token = %self.id, generation, "Synchronization started");
        self.shared.track(tokio::spawn(async move {
            if let Err(err) = running.run().await {
                warn!(token = %id, error = %format!("{err:#}"), "Synchronization round aborted");
            }
            let _ = inbox.send(Inbound::SyncFinished { generation });
        }));

        State::Synchronizing {
            token,
            generation,
            workflow,
        }
    }
}
