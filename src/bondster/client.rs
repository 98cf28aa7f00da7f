use std::sync::Arc;

use chrono::{Datelike, Duration};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::models::{Statement, Token};
use crate::timeshift::TimeRange;

use super::auth::AuthorizedClient;
use super::model::{ContactInformation, MonthFilter, SearchFilter, TransactionFilter, TransferIdList};
use super::GatewayError;

const CONTACT_INFORMATION_PATH: &str =
    "/proxy/clientusersetting/api/private/market/getContactInformation";
const SEARCH_PATH: &str = "/proxy/mktinvestor/api/private/transaction/search";
const LIST_PATH: &str = "/proxy/mktinvestor/api/private/transaction/list";

/// Maximum number of ids sent in one statement list request.
pub const STATEMENT_BATCH_SIZE: usize = 100;

/// Typed operations against the Bondster gateway for one token.
pub struct BondsterClient {
    auth: AuthorizedClient,
}

async fn expect_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|source| GatewayError::Transport { endpoint, source })?;
    if status != StatusCode::OK {
        return Err(GatewayError::Status {
            endpoint,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    serde_json::from_slice(&body).map_err(|source| GatewayError::Malformed { endpoint, source })
}

fn month_filter(at: chrono::DateTime<chrono::Utc>) -> MonthFilter {
    MonthFilter {
        month: at.month().to_string(),
        year: at.year().to_string(),
    }
}

impl BondsterClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: &Token, clock: Arc<dyn Clock>) -> Self {
        Self {
            auth: AuthorizedClient::new(http, base_url, token, clock),
        }
    }

    pub fn authorized(&self) -> &AuthorizedClient {
        &self.auth
    }

    /// Currencies the account trades in, sorted.
    pub async fn currencies(&self) -> Result<Vec<String>, GatewayError> {
        const ENDPOINT: &str = "getContactInformation";
        let url = self.auth.url(CONTACT_INFORMATION_PATH);
        let response = self
            .auth
            .execute(ENDPOINT, |http| http.post(url.as_str()))
            .await?;
        let info: ContactInformation = expect_json(ENDPOINT, response).await?;
        // BTreeMap keys are already sorted
        Ok(info
            .market_verified_external_account
            .currency_to_account_map
            .into_keys()
            .collect())
    }

    /// Transfer ids with a value date inside the months covered by `range`.
    pub async fn statement_ids(
        &self,
        currency: &str,
        range: &TimeRange,
    ) -> Result<Vec<String>, GatewayError> {
        const ENDPOINT: &str = "transaction/search";
        // `end` is exclusive; filter by the month of the last instant inside
        let last = (range.end - Duration::nanoseconds(1)).max(range.start);
        let filter = SearchFilter {
            value_date_from: month_filter(range.start),
            value_date_to: month_filter(last),
        };
        let url = self.auth.url(SEARCH_PATH);
        let response = self
            .auth
            .execute(ENDPOINT, |http| {
                http.post(url.as_str())
                    .header("x-account-context", currency)
                    .json(&filter)
            })
            .await?;
        let ids: TransferIdList = expect_json(ENDPOINT, response).await?;
        Ok(ids.transfer_id_list)
    }

    /// Full statements for `ids`. Callers keep batches at
    /// [`STATEMENT_BATCH_SIZE`] or below.
    pub async fn statements(
        &self,
        currency: &str,
        ids: &[String],
    ) -> Result<Vec<Statement>, GatewayError> {
        const ENDPOINT: &str = "transaction/list";
        let filter = TransactionFilter {
            transaction_ids: ids,
        };
        let url = self.auth.url(LIST_PATH);
        let response = self
            .auth
            .execute(ENDPOINT, |http| {
                http.post(url.as_str())
                    .header("x-account-context", currency)
                    .json(&filter)
            })
            .await?;
        expect_json(ENDPOINT, response).await
    }
}
