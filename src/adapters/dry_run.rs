use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::adapters::traits::{CheckpointStore, DestinationSink};
use crate::crm::models::{Constituent, Gift, GiftType};
use crate::error::AppResult;

/// Reads hit the real CRM. Writes are logged and answered with synthetic ids.
///
/// Synthetic constituents are remembered by email so a repeat donor resolves
/// to the same id for the rest of the run.
pub struct DryRunSink {
    inner: Arc<dyn DestinationSink>,
    counter: AtomicU64,
    synthetic: Mutex<HashMap<String, Constituent>>,
}

impl DryRunSink {
    pub fn new(inner: Arc<dyn DestinationSink>) -> Self {
        Self {
            inner,
            counter: AtomicU64::new(0),
            synthetic: Mutex::new(HashMap::new()),
        }
    }

    fn next_id(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("dry-run-{}-{}", kind, n)
    }
}

#[async_trait]
impl DestinationSink for DryRunSink {
    async fn find_constituents_by_email(&self, email: &str) -> AppResult<Vec<Constituent>> {
        if let Some(existing) = self.synthetic.lock().get(&email_key(email)) {
            debug!("✓ [DRY-RUN] reusing {} for {}", existing.id, email);
            return Ok(vec![existing.clone()]);
        }
        self.inner.find_constituents_by_email(email).await
    }

    async fn create_constituent(&self, constituent: &Constituent) -> AppResult<String> {
        let id = self.next_id("constituent");
        if let Some(email) = constituent.email.as_ref().filter(|e| !e.address.trim().is_empty()) {
            let mut created = constituent.clone();
            created.id = id.clone();
            self.synthetic.lock().insert(email_key(&email.address), created);
        }
        info!(
            "[DRY-RUN] would create constituent {} {} (email {:?}) as {}",
            constituent.first_name,
            constituent.last_name,
            constituent.email.as_ref().map(|e| e.address.as_str()),
            id
        );
        Ok(id)
    }

    async fn list_gifts_by_constituent(
        &self,
        constituent_id: &str,
        gift_type: Option<&GiftType>,
    ) -> AppResult<Vec<Gift>> {
        // Synthetic constituents do not exist upstream
        if constituent_id.starts_with("dry-run-") {
            return Ok(Vec::new());
        }
        self.inner.list_gifts_by_constituent(constituent_id, gift_type).await
    }

    async fn create_gift(&self, gift: &Gift) -> AppResult<String> {
        let id = self.next_id("gift");
        info!(
            "[DRY-RUN] would create {} gift of {} for constituent {} (lookup {}, linked {:?}) as {}",
            gift.gift_type, gift.amount.value, gift.constituent_id, gift.lookup_id, gift.linked_gifts, id
        );
        Ok(id)
    }

    async fn update_gift(&self, gift_id: &str, gift: &Gift) -> AppResult<()> {
        info!(
            "[DRY-RUN] would update gift {} ({} of {})",
            gift_id, gift.gift_type, gift.amount.value
        );
        Ok(())
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checkpoint reads pass through. Every write is dropped.
pub struct DryRunCheckpointStore {
    inner: Arc<dyn CheckpointStore>,
}

impl DryRunCheckpointStore {
    pub fn new(inner: Arc<dyn CheckpointStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CheckpointStore for DryRunCheckpointStore {
    async fn last_sync_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        self.inner.last_sync_time().await
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> AppResult<()> {
        info!("[DRY-RUN] would set last sync time to {}", at);
        Ok(())
    }

    async fn pending_ids(&self) -> AppResult<Vec<String>> {
        self.inner.pending_ids().await
    }

    async fn set_pending_ids(&self, ids: &[String]) -> AppResult<()> {
        info!("[DRY-RUN] would checkpoint {} pending donation(s)", ids.len());
        Ok(())
    }

    async fn remove_pending_id(&self, id: &str) -> AppResult<()> {
        info!("[DRY-RUN] would clear pending donation {}", id);
        Ok(())
    }
}
