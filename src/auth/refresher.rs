use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};

/// Token endpoint response body
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds. Zero when the server omits it.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Exchanges a long-lived refresh credential for a bearer token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse>;
}

/// OAuth 2.0 token endpoint client
pub struct OAuthRefresher {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthRefresher {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Authorization-code grant, used once by the interactive `auth` command.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AppResult<TokenResponse> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> AppResult<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Auth(format!("reading token response: {}", e)))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) if !err.error_description.is_empty() => {
                    format!("{}: {}", err.error, err.error_description)
                }
                Ok(err) => err.error,
                Err(_) => body,
            };
            return Err(AppError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Auth(format!("decoding token response: {}", e)))?;
        if token.access_token.is_empty() {
            return Err(AppError::Auth("token response has no access_token".into()));
        }

        debug!("🔑 Token endpoint issued a {} token", token.token_type);
        Ok(token)
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }
}
