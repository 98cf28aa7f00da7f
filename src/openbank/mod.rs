//! Clients for the downstream vault (accounts) and ledger (transactions).

mod ledger;
mod vault;

pub use ledger::{LedgerClient, LedgerOutcome};
pub use vault::VaultClient;

use reqwest::{Client, StatusCode};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// The service refused the payload. Retrying the same body will not help
    /// until the data changes.
    #[error("{service} rejected malformed request: {body}")]
    Malformed { service: &'static str, body: String },
    #[error("{service} timed out")]
    Timeout { service: &'static str },
    #[error("{service} failed ({status}): {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// POSTs `payload` as JSON and classifies the transport-level failures.
/// Returns the status and body for the caller to interpret.
async fn post_json<T: Serialize + ?Sized>(
    http: &Client,
    service: &'static str,
    url: &str,
    payload: &T,
) -> Result<(StatusCode, String), PostError> {
    let response = http.post(url).json(payload).send().await.map_err(|source| {
        if source.is_timeout() {
            PostError::Timeout { service }
        } else {
            PostError::Transport { service, source }
        }
    })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| PostError::Transport { service, source })?;
    match status {
        StatusCode::BAD_REQUEST => Err(PostError::Malformed { service, body }),
        StatusCode::GATEWAY_TIMEOUT => Err(PostError::Timeout { service }),
        _ => Ok((status, body)),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
