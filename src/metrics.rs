//! In-memory import counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    tokens_created: AtomicU64,
    tokens_deleted: AtomicU64,
    statements_downloaded: AtomicU64,
    accounts_ensured: AtomicU64,
    transactions_imported: AtomicU64,
    transfers_imported: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tokens_created: u64,
    pub tokens_deleted: u64,
    pub statements_downloaded: u64,
    pub accounts_ensured: u64,
    pub transactions_imported: u64,
    pub transfers_imported: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_created(&self) {
        self.tokens_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_deleted(&self) {
        self.tokens_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statements_downloaded(&self, count: u64) {
        self.statements_downloaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn account_ensured(&self) {
        self.accounts_ensured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transaction_imported(&self, transfers: u64) {
        self.transactions_imported.fetch_add(1, Ordering::Relaxed);
        self.transfers_imported.fetch_add(transfers, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_created: self.tokens_created.load(Ordering::Relaxed),
            tokens_deleted: self.tokens_deleted.load(Ordering::Relaxed),
            statements_downloaded: self.statements_downloaded.load(Ordering::Relaxed),
            accounts_ensured: self.accounts_ensured.load(Ordering::Relaxed),
            transactions_imported: self.transactions_imported.load(Ordering::Relaxed),
            transfers_imported: self.transfers_imported.load(Ordering::Relaxed),
        }
    }
}
