//! Gateway request and response payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::Expiring;

const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, EXPIRATION_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginScenarios {
    #[serde(default)]
    pub scenarios: Vec<LoginScenario>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginScenario {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginStep<'a> {
    pub scenario_code: &'a str,
    pub auth_process_step_values: Vec<LoginStepValue<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginStepValue<'a> {
    pub auth_detail_type: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExpiringValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub expiration_date: String,
}

impl ExpiringValue {
    /// `None` when either field is empty or the date is unparsable.
    pub fn to_expiring(&self) -> Option<Expiring> {
        if self.value.is_empty() || self.expiration_date.is_empty() {
            return None;
        }
        parse_expiration(&self.expiration_date).map(|at| Expiring::new(self.value.clone(), at))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResult {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub jwt: ExpiringValue,
    #[serde(default)]
    pub ssid: ExpiringValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProlongResult {
    #[serde(default)]
    pub jwt_token: ExpiringValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContactInformation {
    pub market_verified_external_account: MarketAccounts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MarketAccounts {
    #[serde(default)]
    pub currency_to_account_map: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchFilter {
    pub value_date_from: MonthFilter,
    pub value_date_to: MonthFilter,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct MonthFilter {
    pub month: String,
    pub year: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransferIdList {
    #[serde(default)]
    pub transfer_id_list: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionFilter<'a> {
    pub transaction_ids: &'a [String],
}
