use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::Statement;
use crate::openbank::PostError;
use crate::storage::Marker;

use super::Workflow;

/// Ensures the vault accounts of every downloaded statement that has none
/// yet. A statement is marked only once all of its accounts exist.
///
/// Returns the number of statements marked.
pub(super) async fn create_accounts(wf: Arc<Workflow>, currency: String) -> Result<usize> {
    let ids = wf
        .statements
        .ids_where(&currency, &[Marker::Data], Marker::Accounts)
        .await
        .context("Failed to scan statements without accounts")?;

    // accounts already upserted during this pass
    let mut ensured: HashSet<String> = HashSet::new();
    let mut marked = 0;

    'statements: for id in ids {
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

        for account in statement.accounts(&currency) {
            if ensured.contains(&account.name) {
                continue;
            }
            match wf.ctx.vault.create_account(&wf.ctx.tenant, &account).await {
                Ok(()) => {
                    info!(tenant = %wf.ctx.tenant, account = %account.name, "Account ensured");
                    wf.ctx.metrics.account_ensured();
                    ensured.insert(account.name);
                }
                Err(err @ PostError::Malformed { .. }) => {
                    warn!(
                        token = %wf.token_id,
                        currency = %currency,
                        transfer = %id,
                        account = %account.name,
                        error = %err,
                        "Vault rejected account"
                    );
                    continue 'statements;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to create account {}", account.name));
                }
            }
        }

        wf.statements.set(&currency, &id, Marker::Accounts).await?;
        marked += 1;
    }

    Ok(marked)
}
