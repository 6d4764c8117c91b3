use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::adapters::{ensure_success, DestinationSink};
use crate::auth::TokenCache;
use crate::crm::models::{
    Constituent, ConstituentSearchResponse, CreatedResponse, Gift, GiftListResponse, GiftType,
};
use crate::error::AppResult;

pub const DEFAULT_API_BASE_URL: &str = "https://api.sky.blackbaud.com";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Bb-Api-Subscription-Key";

/// REST client for the CRM. Every request carries a bearer from the shared token cache.
pub struct CrmClient {
    client: Client,
    base_url: String,
    subscription_key: String,
    tokens: Arc<TokenCache>,
}

impl CrmClient {
    pub fn new(
        base_url: impl Into<String>,
        subscription_key: impl Into<String>,
        tokens: Arc<TokenCache>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subscription_key: subscription_key.into(),
            tokens,
        })
    }

    async fn request(&self, method: Method, url: &str) -> AppResult<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key))
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let response = builder.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("⚠️  CRM rejected the access token, dropping it from the cache");
            self.tokens.invalidate().await;
        }
        ensure_success(response).await
    }
}

#[async_trait]
impl DestinationSink for CrmClient {
    #[instrument(skip(self))]
    async fn find_constituents_by_email(&self, email: &str) -> AppResult<Vec<Constituent>> {
        let url = format!("{}/constituent/v1/constituents/search", self.base_url);
        let builder = self
            .request(Method::GET, &url)
            .await?
            .query(&[("search_text", email)]);

        let result: ConstituentSearchResponse = self.send(builder).await?.json().await?;
        debug!("🔍 {} constituent(s) match {}", result.count, email);
        Ok(result.value)
    }

    #[instrument(skip_all)]
    async fn create_constituent(&self, constituent: &Constituent) -> AppResult<String> {
        let url = format!("{}/constituent/v1/constituents", self.base_url);
        let builder = self.request(Method::POST, &url).await?.json(constituent);

        let created: CreatedResponse = self.send(builder).await?.json().await?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn list_gifts_by_constituent(
        &self,
        constituent_id: &str,
        gift_type: Option<&GiftType>,
    ) -> AppResult<Vec<Gift>> {
        let mut query = vec![("constituent_id", constituent_id.to_string())];
        if let Some(gift_type) = gift_type {
            query.push(("gift_type", gift_type.to_string()));
        }

        let first = format!("{}/gift/v1/gifts", self.base_url);
        let mut builder = self.request(Method::GET, &first).await?.query(&query);
        let mut gifts = Vec::new();

        loop {
            let page: GiftListResponse = self.send(builder).await?.json().await?;
            gifts.extend(page.value);

            match page.next_link.filter(|link| !link.is_empty()) {
                Some(next) => builder = self.request(Method::GET, &next).await?,
                None => break,
            }
        }

        debug!("🎁 Constituent {} has {} gift(s)", constituent_id, gifts.len());
        Ok(gifts)
    }

    #[instrument(skip_all, fields(lookup_id = %gift.lookup_id))]
    async fn create_gift(&self, gift: &Gift) -> AppResult<String> {
        let url = format!("{}/gift/v1/gifts", self.base_url);
        let builder = self.request(Method::POST, &url).await?.json(gift);

        let created: CreatedResponse = self.send(builder).await?.json().await?;
        Ok(created.id)
    }

    #[instrument(skip(self, gift))]
    async fn update_gift(&self, gift_id: &str, gift: &Gift) -> AppResult<()> {
        let url = format!("{}/gift/v1/gifts/{}", self.base_url, gift_id);
        let builder = self.request(Method::PATCH, &url).await?.json(gift);

        self.send(builder).await?;
        Ok(())
    }
}
