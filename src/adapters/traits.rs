use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::crm::models::{Constituent, Gift, GiftType};
use crate::error::AppResult;
use crate::source::models::Donation;

/// Where donations come from
#[async_trait]
pub trait DonationSource: Send + Sync {
    /// All donations created at or after `since`, across every page.
    async fn fetch_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Donation>>;

    /// A single donation. Missing ids yield `AppError::NotFound`.
    async fn fetch_by_id(&self, id: &str) -> AppResult<Donation>;
}

/// The CRM the donations are written into
#[async_trait]
pub trait DestinationSink: Send + Sync {
    async fn find_constituents_by_email(&self, email: &str) -> AppResult<Vec<Constituent>>;

    async fn create_constituent(&self, constituent: &Constituent) -> AppResult<String>;

    /// Gifts for one constituent. `None` lists every type.
    async fn list_gifts_by_constituent(
        &self,
        constituent_id: &str,
        gift_type: Option<&GiftType>,
    ) -> AppResult<Vec<Gift>>;

    async fn create_gift(&self, gift: &Gift) -> AppResult<String>;

    async fn update_gift(&self, gift_id: &str, gift: &Gift) -> AppResult<()>;
}

/// Persisted sync progress. Absent values are a valid empty result.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn last_sync_time(&self) -> AppResult<Option<DateTime<Utc>>>;

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> AppResult<()>;

    async fn pending_ids(&self) -> AppResult<Vec<String>>;

    async fn set_pending_ids(&self, ids: &[String]) -> AppResult<()>;

    async fn remove_pending_id(&self, id: &str) -> AppResult<()> {
        let remaining: Vec<String> = self
            .pending_ids()
            .await?
            .into_iter()
            .filter(|pending| pending != id)
            .collect();
        self.set_pending_ids(&remaining).await
    }
}

/// Holder of the long-lived rotating refresh credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> AppResult<String>;

    async fn save(&self, secret: &str) -> AppResult<()>;
}
