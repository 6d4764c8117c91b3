use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::traits::CredentialStore;
use crate::auth::refresher::TokenRefresher;
use crate::error::{AppError, AppResult};

/// A bearer is never handed out this close to its expiry.
pub const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// Longest lifetime trusted from the token endpoint.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub bearer: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.bearer.is_empty() && now < self.expires_at - Duration::minutes(EXPIRY_BUFFER_MINUTES)
    }
}

/// Shared access-token holder for every CRM request
pub struct TokenCache {
    credentials: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    token: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(credentials: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            credentials,
            refresher,
            token: RwLock::new(None),
        }
    }

    /// Returns a usable bearer, refreshing it when absent or about to expire.
    pub async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(Utc::now())) {
                return Ok(token.bearer.clone());
            }
        }

        let mut cached = self.token.write().await;

        // Another caller may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(Utc::now())) {
            debug!("✓ Token refreshed by a concurrent caller");
            return Ok(token.bearer.clone());
        }

        info!("🔄 Refreshing CRM access token");
        let refresh_token = self.credentials.get().await.map_err(into_auth)?;
        let response = self.refresher.refresh(&refresh_token).await.map_err(into_auth)?;

        let now = Utc::now();
        let ttl = token_lifetime(response.expires_in);

        if let Some(rotated) = response
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != refresh_token)
        {
            self.credentials.save(rotated).await.map_err(|e| {
                AppError::Auth(format!("persisting rotated refresh token: {}", e))
            })?;
            info!("🔑 Rotated refresh token persisted");
        }

        let token = CachedToken {
            bearer: response.access_token,
            expires_at: now.checked_add_signed(ttl).unwrap_or(now),
        };
        let bearer = token.bearer.clone();
        info!("✅ Access token valid until {}", token.expires_at);
        *cached = Some(token);

        Ok(bearer)
    }

    /// Drops the cached bearer so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }
}

/// Lifetime for an `expires_in` value, clamped to `MAX_TOKEN_TTL_HOURS`.
fn token_lifetime(expires_in: i64) -> Duration {
    let max = Duration::hours(MAX_TOKEN_TTL_HOURS);
    if expires_in <= 0 {
        return Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES);
    }
    if expires_in > max.num_seconds() {
        warn!("⚠️  Token endpoint sent expires_in={}s, capping at {}h", expires_in, MAX_TOKEN_TTL_HOURS);
        return max;
    }
    Duration::try_seconds(expires_in).unwrap_or(max)
}

fn into_auth(error: AppError) -> AppError {
    match error {
        AppError::Auth(_) => error,
        other => AppError::Auth(other.to_string()),
    }
}
