use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Query string the OAuth provider redirects back with
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Shared state for the one-shot callback listener
#[derive(Clone)]
pub struct CallbackState {
    expected_state: String,
    sender: Arc<Mutex<Option<oneshot::Sender<AppResult<String>>>>>,
}

impl CallbackState {
    pub fn new(expected_state: impl Into<String>) -> (Self, oneshot::Receiver<AppResult<String>>) {
        let (tx, rx) = oneshot::channel();
        let state = Self {
            expected_state: expected_state.into(),
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (state, rx)
    }
}

/// Checks the redirect and extracts the authorization code.
pub fn validate_callback(params: &CallbackParams, expected_state: &str) -> AppResult<String> {
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        let description = params.error_description.as_deref().unwrap_or_default();
        return Err(AppError::Auth(format!(
            "authorization denied: {} {}",
            error, description
        )
        .trim_end()
        .to_string()));
    }

    if params.state.as_deref() != Some(expected_state) {
        return Err(AppError::Auth(
            "state mismatch in OAuth callback, possible CSRF".into(),
        ));
    }

    params
        .code
        .clone()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Auth("OAuth callback carried no authorization code".into()))
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let result = validate_callback(&params, &state.expected_state);
    let response = match &result {
        Ok(_) => (
            StatusCode::OK,
            Html("<h1>Authorization complete</h1><p>You can close this window.</p>".to_string()),
        ),
        Err(e) => {
            warn!("⚠️  OAuth callback rejected: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Html(format!("<h1>Authorization failed</h1><p>{}</p>", e)),
            )
        }
    };

    if let Some(sender) = state.sender.lock().take() {
        let _ = sender.send(result);
    }
    response
}

pub fn create_app(state: CallbackState) -> Router {
    info!("⚙️ Setting up OAuth callback route...");

    Router::new()
        .route("/callback", get(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    app: Router,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let address = listener.local_addr()?;
    info!("🌐 Callback server listening on: {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
