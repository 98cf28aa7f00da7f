//! Periodic synchronization of every stored token.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actor::ActorSystem;
use crate::duration::format_duration;
use crate::metrics::Metrics;
use crate::storage::TokenStore;

pub struct Scheduler {
    actors: Arc<ActorSystem>,
    tokens: TokenStore,
    metrics: Arc<Metrics>,
    sync_rate: Duration,
}

impl Scheduler {
    pub fn new(
        actors: Arc<ActorSystem>,
        tokens: TokenStore,
        metrics: Arc<Metrics>,
        sync_rate: Duration,
    ) -> Self {
        Self {
            actors,
            tokens,
            metrics,
            sync_rate,
        }
    }

    /// Asks the actor of every stored token to synchronize. When several
    /// tokens share a username only the first one (by id) is scheduled.
    ///
    /// Returns the number of tokens scheduled.
    pub async fn tick(&self) -> Result<usize> {
        let tokens = self.tokens.load_all().await?;
        let mut usernames = HashSet::new();
        let mut scheduled = 0;
        for token in tokens {
            if !usernames.insert(token.username.clone()) {
                debug!(token = %token.id, "Skipping token with duplicate username");
                continue;
            }
            self.actors.synchronize(&token.id);
            scheduled += 1;
        }

        let snapshot = self.metrics.snapshot();
        info!(
            scheduled,
            tokens_created = snapshot.tokens_created,
            tokens_deleted = snapshot.tokens_deleted,
            statements_downloaded = snapshot.statements_downloaded,
            accounts_ensured = snapshot.accounts_ensured,
            transactions_imported = snapshot.transactions_imported,
            transfers_imported = snapshot.transfers_imported,
            "Synchronization tick"
        );
        Ok(scheduled)
    }

    /// Ticks immediately and then every `sync_rate` until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(rate = %format_duration(self.sync_rate), "Scheduler started");
        loop {
            if let Err(err) = self.tick().await {
                warn!(error = %format!("{err:#}"), "Synchronization tick failed");
            }

            let sleep = tokio::time::sleep(self.sync_rate);
            tokio::pin!(sleep);

            tokio::select! {
                _ = &mut sleep => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Scheduler stopped");
    }
}
