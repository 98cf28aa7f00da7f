use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::bondster::STATEMENT_BATCH_SIZE;
use crate::models::{import_epoch, Id};
use crate::storage::Marker;
use crate::timeshift::partition_by_month;

use super::Workflow;

/// Marks every remote transfer id since the cursor as known, then fetches the
/// bodies of all known statements that have no data yet.
///
/// Returns the number of statements stored.
pub(super) async fn download_statements(wf: Arc<Workflow>, currency: String) -> Result<usize> {
    discover_ids(&wf, &currency).await?;

    let missing = wf
        .statements
        .ids_where(&currency, &[], Marker::Data)
        .await
        .context("Failed to scan statements without data")?;
    if missing.is_empty() {
        return Ok(0);
    }
    debug!(token = %wf.token_id, currency = %currency, count = missing.len(), "Downloading statements");

    let mut stored = 0;
    for batch in missing.chunks(STATEMENT_BATCH_SIZE) {
        if wf.is_abandoned() {
            break;
        }
        let statements = wf
            .client
            .statements(&currency, batch)
            .await
            .context("Failed to download statements")?;

        let mut latest = None;
        let mut batch_stored = 0;
        for statement in statements {
            let id = &statement.id_transfer;
            if !Id::is_path_safe(id) {
                warn!(token = %wf.token_id, currency = %currency, transfer = %id, "Skipping statement with unsafe id");
                continue;
            }
            let data = serde_json::to_vec(&statement).context("Failed to serialize statement")?;
            if wf
                .statements
                .store_data(&currency, id, &data)
                .await
                .with_context(|| format!("Failed to store statement {id}"))?
            {
                batch_stored += 1;
            }
            latest = latest.max(Some(statement.value_date));
        }

        wf.ctx.metrics.statements_downloaded(batch_stored as u64);
        stored += batch_stored;
        if let Some(at) = latest {
            wf.checkpoint(&currency, at).await;
        }
    }

    Ok(stored)
}

async fn discover_ids(wf: &Workflow, currency: &str) -> Result<()> {
    let from = wf.token.read().await.cursor(currency).unwrap_or_else(import_epoch);
    let now = wf.ctx.clock.now();

    for range in partition_by_month(from, now) {
        if wf.is_abandoned() {
            break;
        }
        let ids = wf
            .client
            .statement_ids(currency, &range)
            .await
            .with_context(|| format!("Failed to search statements from {}", range.start))?;

        for id in ids {
            if !Id::is_path_safe(&id) {
                warn!(token = %wf.token_id, currency = %currency, transfer = %id, "Skipping unsafe transfer id");
                continue;
            }
            if !wf.statements.has(currency, &id, Marker::Known).await? {
                wf.statements.set(currency, &id, Marker::Known).await?;
            }
        }
    }
    Ok(())
}
