use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::models::Statement;
use crate::openbank::{LedgerOutcome, PostError};
use crate::storage::Marker;

use super::Workflow;

/// Posts one ledger transaction per statement whose accounts exist and which
/// has not been posted yet.
///
/// Returns the number of statements marked as posted.
pub(super) async fn post_transactions(wf: Arc<Workflow>, currency: String) -> Result<usize> {
    let ids = wf
        .statements
        .ids_where(&currency, &[Marker::Data, Marker::Accounts], Marker::Transactions)
        .await
        .context("Failed to scan statements without transactions")?;

    let mut posted = 0;
    for id in ids {
        if wf.is_abandoned() {
            break;
        }
        let Some(data) = wf.statements.data(&currency, &id).await? else {
            continue;
        };
        let statement: Statement = match serde_json::from_slice(&data) {
            Ok(statement) => statement,
            Err(err) => {
                warn!(token = %wf.token_id, currency = %currency, transfer = %id, error = %err, "Unreadable statement");
                continue;
            }
        };
        if statement.storno {
            warn!(token = %wf.token_id, currency = %currency, transfer = %id, "Importing storno statement");
        }

        let transaction = statement.transaction(&wf.ctx.tenant, &currency);
        match wf.ctx.ledger.create_transaction(&wf.ctx.tenant, &transaction).await {
            Ok(LedgerOutcome::Accepted) => {
                info!(tenant = %wf.ctx.tenant, transaction = %transaction.id, "Transaction imported");
                wf.ctx
                    .metrics
                    .transaction_imported(transaction.transfers.len() as u64);
            }
            Ok(LedgerOutcome::Duplicate) => {
                debug!(tenant = %wf.ctx.tenant, transaction = %transaction.id, "Transaction already imported");
            }
            // retried on the next round; siblings still get posted
            Err(err @ (PostError::Malformed { .. } | PostError::Timeout { .. })) => {
                warn!(token = %wf.token_id, currency = %currency, transfer = %id, error = %err, "Ledger did not accept transaction");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to post transaction {}", transaction.id));
            }
        }

        wf.statements.set(&currency, &id, Marker::Transactions).await?;
        posted += 1;
    }

    Ok(posted)
}
