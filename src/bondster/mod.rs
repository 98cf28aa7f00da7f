//! Client for the Bondster internet banking gateway.

mod auth;
mod client;
mod device;
mod model;
pub mod session;

pub use auth::AuthorizedClient;
pub use client::{BondsterClient, STATEMENT_BATCH_SIZE};
pub use device::random_device;
pub use session::{Expiring, Session};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Login or prolong failed; the whole round for the token is aborted.
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("{endpoint} failed ({status}): {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned a malformed body: {source}")]
    Malformed {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, GatewayError::Authentication(_))
    }
}
