use reqwest::{Client, StatusCode};

use crate::models::Account;

use super::{join_url, post_json, PostError};

const SERVICE: &str = "vault";

#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    base_url: String,
}

impl VaultClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Creates the account for `tenant`. An account that already exists
    /// (409) counts as success.
    pub async fn create_account(&self, tenant: &str, account: &Account) -> Result<(), PostError> {
        let url = join_url(&self.base_url, &format!("/account/{tenant}"));
        let (status, body) = post_json(&self.http, SERVICE, &url, account).await?;
        match status {
            StatusCode::OK | StatusCode::CONFLICT => Ok(()),
            other => Err(PostError::Status {
                service: SERVICE,
                status: other.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn respond(status: u16) -> Result<(), PostError> {
        let server = MockServer::start().await;
        let account = Account::nostro("CZK");
        Mock::given(method("POST"))
            .and(path("/account/acme"))
            .and(body_json(&account))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        VaultClient::new(Client::new(), server.uri())
            .create_account("acme", &account)
            .await
    }

    #[tokio::test]
    async fn ok_and_conflict_are_success() {
        assert!(respond(200).await.is_ok());
        assert!(respond(409).await.is_ok());
    }

    #[tokio::test]
    async fn classifies_failures() {
        assert!(matches!(respond(400).await, Err(PostError::Malformed { .. })));
        assert!(matches!(respond(504).await, Err(PostError::Timeout { .. })));
        assert!(matches!(
            respond(500).await,
            Err(PostError::Status { status: 500, .. })
        ));
        // 201 is not part of the vault contract
        assert!(matches!(
            respond(201).await,
            Err(PostError::Status { status: 201, .. })
        ));
    }
}
