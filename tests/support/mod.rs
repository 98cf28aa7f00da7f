#![allow(dead_code)]

use std::sync::Arc;

use bondster_import::clock::FixedClock;
use bondster_import::metrics::Metrics;
use bondster_import::models::{Id, Token};
use bondster_import::openbank::{LedgerClient, VaultClient};
use bondster_import::storage::{MemoryStorage, Storage, TokenStore};
use bondster_import::sync::WorkflowContext;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "acme";

pub const LOGIN_SCENARIO_PATH: &str = "/proxy/router/api/public/authentication/getLoginScenario";
pub const LOGIN_STEP_PATH: &str = "/proxy/router/api/public/authentication/validateLoginStep";
pub const PROLONG_PATH: &str = "/proxy/router/api/private/token/prolong";
pub const CONTACT_PATH: &str = "/proxy/clientusersetting/api/private/market/getContactInformation";
pub const SEARCH_PATH: &str = "/proxy/mktinvestor/api/private/transaction/search";
pub const LIST_PATH: &str = "/proxy/mktinvestor/api/private/transaction/list";

/// 2024-02-15 12:00:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn token(id: &str, username: &str) -> Token {
    Token::new(
        Id::from_string(id),
        username,
        SecretString::from("secret".to_string()),
        now(),
    )
}

pub fn expiring(value: &str, expires: &str) -> Value {
    json!({ "value": value, "expirationDate": expires })
}

/// Mounts a successful USR_PWD login issuing `jwt-1` and `ssid-1`, both
/// valid until 13:00.
pub async fn mount_login(server: &MockServer) {
    mount_login_until(server, "2024-02-15T13:00:00.000Z", "2024-02-15T13:00:00.000Z").await;
}

pub async fn mount_login_until(server: &MockServer, jwt_until: &str, ssid_until: &str) {
    Mock::given(method("GET"))
        .and(path(LOGIN_SCENARIO_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"scenarios": [{"code": "USR_PWD"}]})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN_STEP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "FINISH",
            "jwt": expiring("jwt-1", jwt_until),
            "ssid": expiring("ssid-1", ssid_until),
        })))
        .mount(server)
        .await;
}

pub async fn mount_currencies(server: &MockServer, currencies: &[&str]) {
    let map: serde_json::Map<String, Value> = currencies
        .iter()
        .map(|c| (c.to_string(), json!({"accountNumber": "123", "bankCode": "0100"})))
        .collect();
    Mock::given(method("POST"))
        .and(path(CONTACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "marketVerifiedExternalAccount": {"currencyToAccountMap": map}
        })))
        .mount(server)
        .await;
}

pub fn fee_statement(id: &str, value_date: &str) -> Value {
    json!({
        "idTransaction": format!("tx-{id}"),
        "idTransfer": id,
        "transactionType": "FEE",
        "direction": "CREDIT",
        "valueDate": value_date,
        "amount": {"amount": 12.5, "currencyCode": "CZK"},
    })
}

pub fn principal_statement(id: &str, value_date: &str) -> Value {
    json!({
        "idTransaction": format!("tx-{id}"),
        "idTransfer": id,
        "transactionType": "PRINCIPAL_PAYMENT",
        "direction": "DEBIT",
        "loanNumber": "L-7",
        "valueDate": value_date,
        "originator": {"idOriginator": "o-1", "originatorName": "Acme"},
        "amount": {"amount": 100, "currencyCode": "CZK"},
    })
}

/// Shared collaborators for workflow and actor tests.
pub struct Harness {
    pub ctx: Arc<WorkflowContext>,
    pub tokens: TokenStore,
    pub plaintext: Arc<MemoryStorage>,
    pub metrics: Arc<Metrics>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// `gateway` serves the Bondster API; vault and ledger live on `openbank`.
    pub fn new(gateway: &MockServer, openbank: &MockServer) -> Self {
        let http = reqwest::Client::new();
        let plaintext = Arc::new(MemoryStorage::new());
        let encrypted: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let tokens = TokenStore::new(encrypted);
        let metrics = Arc::new(Metrics::new());
        let clock = Arc::new(FixedClock::new(now()));

        let ctx = Arc::new(WorkflowContext {
            tenant: TENANT.to_string(),
            http: http.clone(),
            bondster_url: gateway.uri(),
            vault: VaultClient::new(http.clone(), openbank.uri()),
            ledger: LedgerClient::new(http, openbank.uri()),
            tokens: tokens.clone(),
            plaintext: plaintext.clone(),
            metrics: metrics.clone(),
            clock: clock.clone(),
        });

        Self {
            ctx,
            tokens,
            plaintext,
            metrics,
            clock,
        }
    }
}
