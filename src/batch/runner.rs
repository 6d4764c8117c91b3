use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::traits::{CheckpointStore, DonationSource};
use crate::batch::summary::{BatchSummary, RunMode};
use crate::error::{AppError, AppResult, ReconcileError, Stage};
use crate::reconcile::engine::ReconciliationEngine;
use crate::reconcile::gift_cache::GiftCache;
use crate::source::models::Donation;

/// Batch sizing and fetch window
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on the pending checkpoint
    pub max_batch_size: usize,
    /// How far back a first run looks when no last-sync time exists
    pub lookback: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 300,      // comma-joined ids must fit a 4KB parameter
            lookback: Duration::days(30),
        }
    }
}

/// Resumable loop around the reconciliation engine.
///
/// The pending list is written before any donation is touched and each id is
/// removed once its donation has been handled, so an interrupted run leaves
/// exactly the unfinished ids behind.
pub struct BatchRunner {
    source: Arc<dyn DonationSource>,
    checkpoint: Arc<dyn CheckpointStore>,
    engine: ReconciliationEngine,
    config: RunnerConfig,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn DonationSource>,
        checkpoint: Arc<dyn CheckpointStore>,
        engine: ReconciliationEngine,
        config: RunnerConfig,
    ) -> Self {
        Self {
            source,
            checkpoint,
            engine,
            config,
        }
    }

    /// Runs one batch. `Err` means the run was aborted; per-donation failures
    /// are reported in the summary instead.
    pub async fn run(
        &self,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> AppResult<BatchSummary> {
        let pending = self.checkpoint.pending_ids().await.map_err(checkpoint_error)?;

        if pending.is_empty() {
            self.run_fresh(since, cancel).await
        } else {
            if since.is_some() {
                warn!("⚠️  Ignoring --since while {} donation(s) are pending", pending.len());
            }
            self.run_resuming(pending, cancel).await
        }
    }

    #[instrument(skip_all)]
    async fn run_fresh(
        &self,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> AppResult<BatchSummary> {
        let mut summary = BatchSummary::new(RunMode::Fresh);
        let fetch_started = Utc::now();

        let since = match since {
            Some(explicit) => explicit,
            None => self
                .checkpoint
                .last_sync_time()
                .await
                .map_err(checkpoint_error)?
                .unwrap_or_else(|| {
                    fetch_started
                        .checked_sub_signed(self.config.lookback)
                        .unwrap_or(DateTime::<Utc>::MIN_UTC)
                }),
        };
        info!("🔄 Fetching donations created since {}", since);

        let mut donations = self.source.fetch_since(since).await?;
        donations.sort_by_key(|d| d.created_at);

        let truncated = donations.len() > self.config.max_batch_size;
        if truncated {
            warn!(
                "⚠️  {} donations fetched, processing the oldest {} this run",
                donations.len(),
                self.config.max_batch_size
            );
            donations.truncate(self.config.max_batch_size);
        }

        let ids: Vec<String> = donations.iter().map(|d| d.id.clone()).collect();
        if !ids.is_empty() {
            self.checkpoint
                .set_pending_ids(&ids)
                .await
                .map_err(checkpoint_error)?;
            info!("💾 Checkpointed {} pending donation(s)", ids.len());
        }

        let mut cache = GiftCache::new();
        for donation in &donations {
            self.process_one(donation, &mut cache, &mut summary, cancel)
                .await?;
        }

        // A truncated batch resumes from its last donation so the tail is fetched next time
        let next_sync = match donations.last() {
            Some(last) if truncated => last.created_at,
            _ => fetch_started,
        };
        self.checkpoint
            .set_last_sync_time(next_sync)
            .await
            .map_err(checkpoint_error)?;

        info!("✅ Batch complete, next sync from {}", next_sync);
        Ok(summary)
    }

    #[instrument(skip_all, fields(pending = pending.len()))]
    async fn run_resuming(
        &self,
        pending: Vec<String>,
        cancel: &CancellationToken,
    ) -> AppResult<BatchSummary> {
        let mut summary = BatchSummary::new(RunMode::Resuming);
        info!("🔄 Resuming interrupted batch of {} donation(s)", pending.len());

        let mut cache = GiftCache::new();
        for id in &pending {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                fetched = self.source.fetch_by_id(id) => fetched,
            };

            match fetched {
                Ok(donation) => {
                    self.process_one(&donation, &mut cache, &mut summary, cancel)
                        .await?;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("⚠️  Could not re-fetch pending donation {}: {}", id, e);
                    summary.record_failure(id, &ReconcileError::new(Stage::FetchDonation, e));
                    self.checkpoint
                        .remove_pending_id(id)
                        .await
                        .map_err(checkpoint_error)?;
                }
            }
        }

        info!("✅ Resumed batch complete");
        Ok(summary)
    }

    async fn process_one(
        &self,
        donation: &Donation,
        cache: &mut GiftCache,
        summary: &mut BatchSummary,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            outcome = self.engine.process(donation, cache) => outcome,
        };

        if outcome.is_fatal() {
            return match outcome.result {
                Err(e) => Err(e.source),
                Ok(_) => Err(AppError::Internal("fatal outcome without error".into())),
            };
        }

        summary.record(&outcome);
        self.checkpoint
            .remove_pending_id(&donation.id)
            .await
            .map_err(checkpoint_error)
    }
}

fn checkpoint_error(error: AppError) -> AppError {
    match error {
        AppError::Checkpoint(_) => error,
        other => AppError::Checkpoint(other.to_string()),
    }
}
