use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::{Id, Token};

use super::model::{LoginResult, LoginScenarios, LoginStep, LoginStepValue, ProlongResult};
use super::session::Session;
use super::GatewayError;

const LOGIN_SCENARIO_PATH: &str = "/proxy/router/api/public/authentication/getLoginScenario";
const LOGIN_STEP_PATH: &str = "/proxy/router/api/public/authentication/validateLoginStep";
const PROLONG_PATH: &str = "/proxy/router/api/private/token/prolong";
const SUPPORTED_SCENARIO: &str = "USR_PWD";

/// HTTP client that keeps a gateway session alive for one token.
///
/// Every request goes out with a valid session: an expired ssid forces a full
/// login, an expired JWT is prolonged (falling back to login). A 401 clears
/// the session and the request is retried once.
pub struct AuthorizedClient {
    http: Client,
    base_url: String,
    token_id: Id,
    username: String,
    password: SecretString,
    session: Mutex<Session>,
    clock: Arc<dyn Clock>,
}

fn auth_error(context: &str, detail: impl std::fmt::Display) -> GatewayError {
    GatewayError::Authentication(format!("{context}: {detail}"))
}

fn header_value(value: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(value).map_err(|e| auth_error("invalid session header", e))
}

impl AuthorizedClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: &Token, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_id: token.id.clone(),
            username: token.username.clone(),
            password: token.password.clone(),
            session: Mutex::new(Session::new()),
            clock,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    fn headers(session: &Session, authorized: bool) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("device"), header_value(&session.device)?);
        headers.insert(
            HeaderName::from_static("channeluuid"),
            header_value(&session.channel)?,
        );
        headers.insert(
            HeaderName::from_static("x-active-language"),
            HeaderValue::from_static("cs"),
        );
        if authorized {
            if let Some(jwt) = &session.jwt {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", jwt.value))?);
            }
            if let Some(ssid) = &session.ssid {
                headers.insert(HeaderName::from_static("ssid"), header_value(&ssid.value)?);
            }
        }
        Ok(headers)
    }

    async fn auth_json<T: DeserializeOwned>(
        context: &str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(|e| auth_error(context, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| auth_error(context, e))?;
        if status != StatusCode::OK {
            return Err(auth_error(
                context,
                format!("status {status}: {}", String::from_utf8_lossy(&body)),
            ));
        }
        serde_json::from_slice(&body).map_err(|e| auth_error(context, e))
    }

    async fn login(&self, session: &mut Session) -> Result<(), GatewayError> {
        session.clear();
        let headers = Self::headers(session, false)?;

        let scenarios: LoginScenarios = Self::auth_json(
            "get login scenario",
            self.http
                .get(self.url(LOGIN_SCENARIO_PATH))
                .headers(headers.clone()),
        )
        .await?;
        let code = scenarios
            .scenarios
            .first()
            .map(|s| s.code.as_str())
            .unwrap_or_default();
        if code != SUPPORTED_SCENARIO {
            return Err(auth_error("unsupported login scenario", format!("{code:?}")));
        }

        let step = LoginStep {
            scenario_code: SUPPORTED_SCENARIO,
            auth_process_step_values: vec![
                LoginStepValue {
                    auth_detail_type: "USERNAME",
                    value: &self.username,
                },
                LoginStepValue {
                    auth_detail_type: "PWD",
                    value: self.password.expose_secret(),
                },
            ],
        };
        let result: LoginResult = Self::auth_json(
            "validate login step",
            self.http
                .post(self.url(LOGIN_STEP_PATH))
                .headers(headers)
                .json(&step),
        )
        .await?;

        if result.result != "FINISH" {
            return Err(auth_error("login did not finish", &result.result));
        }
        let jwt = result
            .jwt
            .to_expiring()
            .ok_or_else(|| auth_error("validate login step", "missing jwt"))?;
        let ssid = result
            .ssid
            .to_expiring()
            .ok_or_else(|| auth_error("validate login step", "missing ssid"))?;

        debug!(token = %self.token_id, valid_until = %jwt.expires_at, "Logged in");
        session.jwt = Some(jwt);
        session.ssid = Some(ssid);
        Ok(())
    }

    async fn prolong(&self, session: &mut Session) -> Result<(), GatewayError> {
        let headers = Self::headers(session, true)?;
        let result: ProlongResult = Self::auth_json(
            "prolong token",
            self.http.post(self.url(PROLONG_PATH)).headers(headers),
        )
        .await?;
        let jwt = result
            .jwt_token
            .to_expiring()
            .ok_or_else(|| auth_error("prolong token", "missing jwtToken"))?;

        info!(token = %self.token_id, valid_until = %jwt.expires_at, "Session prolonged");
        session.jwt = Some(jwt);
        Ok(())
    }

    /// Brings the session up to date and returns the headers to send.
    async fn authorize(&self) -> Result<HeaderMap, GatewayError> {
        let mut session = self.session.lock().await;
        let now = self.clock.now();
        if session.is_usable(now) {
            return Self::headers(&session, true);
        }
        if session.is_ssid_expired(now) {
            self.login(&mut session).await?;
        } else if let Err(err) = self.prolong(&mut session).await {
            warn!(token = %self.token_id, error = %err, "Prolong failed, logging in again");
            self.login(&mut session).await?;
        }
        Self::headers(&session, true)
    }

    /// Sends the request built by `build` with session headers attached.
    pub async fn execute<F>(&self, endpoint: &'static str, build: F) -> Result<Response, GatewayError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            let headers = self.authorize().await?;
            let response = build(&self.http)
                .headers(headers)
                .send()
                .await
                .map_err(|source| GatewayError::Transport { endpoint, source })?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                warn!(token = %self.token_id, endpoint, "Authorization lost");
                self.session.lock().await.clear();
                retried = true;
                continue;
            }
            return Ok(response);
        }
    }
}
