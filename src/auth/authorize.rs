use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use reqwest::Url;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::traits::CredentialStore;
use crate::auth::refresher::OAuthRefresher;
use crate::error::{AppError, AppResult};
use crate::server::{self, CallbackState};

/// How long the operator has to finish the browser consent step
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Random CSRF token for the authorization request
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE.encode(bytes)
}

pub fn authorization_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> AppResult<Url> {
    Url::parse_with_params(
        authorize_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("state", state),
        ],
    )
    .map_err(|e| AppError::Config(format!("invalid authorize URL {}: {}", authorize_url, e)))
}

/// Interactive authorization-code flow that seeds the credential store
pub struct Authorizer {
    refresher: OAuthRefresher,
    credentials: Arc<dyn CredentialStore>,
    authorize_url: String,
    client_id: String,
    port: u16,
    open_browser: bool,
}

impl Authorizer {
    pub fn new(
        refresher: OAuthRefresher,
        credentials: Arc<dyn CredentialStore>,
        authorize_url: impl Into<String>,
        client_id: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            refresher,
            credentials,
            authorize_url: authorize_url.into(),
            client_id: client_id.into(),
            port,
            open_browser: true,
        }
    }

    /// Only print the authorize URL instead of also launching a browser.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub async fn run(&self) -> AppResult<()> {
        let state = generate_state();
        let redirect_uri = format!("http://localhost:{}/callback", self.port);
        let url = authorization_url(&self.authorize_url, &self.client_id, &redirect_uri, &state)?;

        let listener = TcpListener::bind(("127.0.0.1", self.port)).await?;
        let (callback_state, receiver) = CallbackState::new(state);
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(server::run_server(
            server::create_app(callback_state),
            listener,
            shutdown.clone(),
        ));

        println!("Open this URL in your browser to authorize giftbridge:\n\n  {}\n", url);
        if self.open_browser {
            match open::that(url.as_str()) {
                Ok(()) => println!("Browser opened automatically."),
                Err(e) => debug!("Could not launch a browser: {}", e),
            }
        }
        info!("⏳ Waiting up to {}s for the OAuth callback", CALLBACK_TIMEOUT.as_secs());

        let outcome = tokio::time::timeout(CALLBACK_TIMEOUT, receiver).await;
        shutdown.cancel();
        let _ = server.await;

        let code = match outcome {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(AppError::Internal("callback server stopped early".into())),
            Err(_) => return Err(AppError::Auth("timed out waiting for the OAuth callback".into())),
        };

        let tokens = self.refresher.exchange_code(&code, &redirect_uri).await?;
        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Auth("token response carried no refresh token".into()))?;

        self.credentials.save(&refresh_token).await?;
        info!("✅ Authorization complete, refresh token stored");
        Ok(())
    }
}
