//! Statement synchronization for one token.
//!
//! A round runs three stages in order: download statements, create vault
//! accounts, post ledger transactions. Within a stage every currency gets its
//! own task. Progress lives in the [`StatementStore`] markers and the token's
//! cursors, so an interrupted round simply resumes on the next one.

mod accounts;
mod download;
mod transactions;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bondster::BondsterClient;
use crate::clock::Clock;
use crate::metrics::Metrics;
use crate::models::{Id, Token};
use crate::openbank::{LedgerClient, VaultClient};
use crate::storage::{StatementStore, Storage, TokenStore};

/// Long-lived collaborators shared by every workflow.
pub struct WorkflowContext {
    pub tenant: String,
    pub http: reqwest::Client,
    pub bondster_url: String,
    pub vault: VaultClient,
    pub ledger: LedgerClient,
    pub tokens: TokenStore,
    pub plaintext: Arc<dyn Storage>,
    pub metrics: Arc<Metrics>,
    pub clock: Arc<dyn Clock>,
}

/// One synchronization round of one token.
pub struct Workflow {
    ctx: Arc<WorkflowContext>,
    token_id: Id,
    token: RwLock<Token>,
    client: BondsterClient,
    statements: StatementStore,
    abandoned: AtomicBool,
}

impl Workflow {
    pub fn new(ctx: Arc<WorkflowContext>, token: Token) -> Self {
        let client = BondsterClient::new(
            ctx.http.clone(),
            ctx.bondster_url.clone(),
            &token,
            ctx.clock.clone(),
        );
        let statements = StatementStore::new(ctx.plaintext.clone(), token.id.clone());
        Self {
            token_id: token.id.clone(),
            token: RwLock::new(token),
            client,
            statements,
            abandoned: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Stops the round from persisting the token again. Once this returns no
    /// checkpoint is in flight, so the record can be deleted safely.
    pub async fn abandon(&self) {
        let _token = self.token.write().await;
        self.abandoned.store(true, Ordering::SeqCst);
    }

    /// Current in-memory copy of the token.
    pub async fn token(&self) -> Token {
        self.token.read().await.clone()
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        debug!(token = %self.token_id, "Synchronization round started");
        let currencies = self.discover_currencies().await?;

        self.run_stage("download", &currencies, download::download_statements)
            .await;
        self.run_stage("accounts", &currencies, accounts::create_accounts)
            .await;
        self.run_stage("transactions", &currencies, transactions::post_transactions)
            .await;

        debug!(token = %self.token_id, "Synchronization round finished");
        Ok(())
    }

    /// Registers newly listed currencies at the import epoch and returns every
    /// currency known to the token.
    async fn discover_currencies(&self) -> Result<Vec<String>> {
        let listed = self
            .client
            .currencies()
            .await
            .with_context(|| format!("Failed to list currencies for token {}", self.token_id))?;

        let mut token = self.token.write().await;
        let mut added = false;
        for currency in &listed {
            if !Id::is_path_safe(currency) {
                warn!(token = %self.token_id, currency = %currency, "Skipping unsafe currency code");
                continue;
            }
            if token.add_currency(currency) {
                info!(token = %self.token_id, currency = %currency, "New currency discovered");
                added = true;
            }
        }
        if added {
            self.persist(&token).await;
        }
        Ok(token.currencies().map(str::to_string).collect())
    }

    /// Advances the cursor and persists the token while still holding the
    /// write lock, so an older snapshot can never overwrite a newer one.
    async fn checkpoint(&self, currency: &str, at: DateTime<Utc>) {
        let mut token = self.token.write().await;
        if token.advance_cursor(currency, at) {
            self.persist(&token).await;
        }
    }

    async fn persist(&self, token: &Token) {
        if self.is_abandoned() {
            debug!(token = %self.token_id, "Token abandoned, checkpoint dropped");
            return;
        }
        match self.ctx.tokens.update(token).await {
            Ok(true) => {}
            Ok(false) => debug!(token = %self.token_id, "Token gone, checkpoint dropped"),
            Err(err) => warn!(token = %self.token_id, error = %format!("{err:#}"), "Failed to persist token"),
        }
    }

    async fn run_stage<F, Fut>(self: &Arc<Self>, stage: &'static str, currencies: &[String], work: F)
    where
        F: Fn(Arc<Workflow>, String) -> Fut,
        Fut: Future<Output = Result<usize>> + Send + 'static,
    {
        if self.is_abandoned() {
            return;
        }
        let mut tasks = JoinSet::new();
        for currency in currencies {
            let job = work(self.clone(), currency.clone());
            let currency = currency.clone();
            tasks.spawn(async move { (currency, job.await) });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((currency, Ok(count))) => {
                    debug!(token = %self.token_id, stage, currency = %currency, count, "Stage finished");
                }
                Ok((currency, Err(err))) => {
                    warn!(
                        token = %self.token_id,
                        stage,
                        currency = %currency,
                        error = %format!("{err:#}"),
                        "Stage aborted"
                    );
                }
                Err(err) => {
                    warn!(token = %self.token_id, stage, error = %err, "Stage task failed");
                }
            }
        }
    }
}
