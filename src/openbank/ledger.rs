use reqwest::{Client, StatusCode};

use crate::models::Transaction;

use super::{join_url, post_json, PostError};

const SERVICE: &str = "ledger";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Accepted,
    /// The ledger already holds a transaction with this id.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn create_transaction(
        &self,
        tenant: &str,
        transaction: &Transaction,
    ) -> Result<LedgerOutcome, PostError> {
        let url = join_url(&self.base_url, &format!("/transaction/{tenant}"));
        let (status, body) = post_json(&self.http, SERVICE, &url, transaction).await?;
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(LedgerOutcome::Accepted),
            StatusCode::CONFLICT => Ok(LedgerOutcome::Duplicate),
            other => Err(PostError::Status {
                service: SERVICE,
                status: other.as_u16(),
                body,
            }),
        }
    }
}
