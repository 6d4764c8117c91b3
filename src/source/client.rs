use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument};

use crate::adapters::{ensure_success, DonationSource};
use crate::error::{AppError, AppResult};
use crate::source::models::{Donation, DonationPage};

pub const DEFAULT_BASE_URL: &str = "https://api.fundraiseup.com/v1";

/// Page size requested from the listing endpoint
const PAGE_LIMIT: u32 = 100;

/// REST client for the donation platform
pub struct DonationPlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DonationPlatformClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_page(
        &self,
        since: DateTime<Utc>,
        starting_after: Option<&str>,
    ) -> AppResult<DonationPage> {
        let mut query = vec![
            ("created[gte]", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/donations", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json::<DonationPage>().await?)
    }
}

#[async_trait]
impl DonationSource for DonationPlatformClient {
    #[instrument(skip(self))]
    async fn fetch_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Donation>> {
        let mut donations = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.fetch_page(since, cursor.as_deref()).await?;
            debug!("📄 Fetched page of {} donations", page.data.len());

            let last_id = match page.data.last() {
                Some(last) => last.id.clone(),
                None => break,
            };
            donations.extend(page.data);

            if !page.has_more {
                break;
            }
            cursor = Some(last_id);
        }

        info!("✓ Fetched {} donations since {}", donations.len(), since);
        Ok(donations)
    }

    #[instrument(skip(self))]
    async fn fetch_by_id(&self, id: &str) -> AppResult<Donation> {
        let response = self
            .client
            .get(format!("{}/donations/{}", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("donation {}", id)));
        }
        Ok(ensure_success(response).await?.json::<Donation>().await?)
    }
}
