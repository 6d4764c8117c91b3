use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::adapters::traits::DestinationSink;
use crate::crm::models::Gift;
use crate::error::{ReconcileError, Stage, StageExt};
use crate::reconcile::constituent::{ConstituentResolver, ResolvedConstituent};
use crate::reconcile::duplicate::DuplicateDetector;
use crate::reconcile::gift_cache::GiftCache;
use crate::reconcile::mapper::GiftMapper;
use crate::reconcile::recurring::RecurringContextResolver;
use crate::source::models::Donation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiftAction {
    Created,
    SkippedExisting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftOutcome {
    pub action: GiftAction,
    pub gift_id: String,
}

/// Everything that happened to one donation
#[derive(Debug)]
pub struct DonationOutcome {
    pub donation_id: String,
    /// Set once the constituent step succeeded, even if a later step failed
    pub constituent: Option<ResolvedConstituent>,
    pub result: Result<GiftOutcome, ReconcileError>,
}

impl DonationOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_fatal())
    }
}

/// Per-donation pipeline: constituent, duplicate check, recurring context, mapping, create
pub struct ReconciliationEngine {
    sink: Arc<dyn DestinationSink>,
    constituents: ConstituentResolver,
    duplicates: DuplicateDetector,
    recurring: RecurringContextResolver,
    mapper: GiftMapper,
}

impl ReconciliationEngine {
    pub fn new(sink: Arc<dyn DestinationSink>, mapper: GiftMapper) -> Self {
        Self {
            constituents: ConstituentResolver::new(sink.clone()),
            duplicates: DuplicateDetector::new(sink.clone()),
            recurring: RecurringContextResolver::new(sink.clone()),
            sink,
            mapper,
        }
    }

    /// Never fails: every error ends up in the outcome.
    #[instrument(skip_all, fields(donation_id = %donation.id))]
    pub async fn process(&self, donation: &Donation, cache: &mut GiftCache) -> DonationOutcome {
        let mut constituent = None;
        let result = self.run(donation, cache, &mut constituent).await;

        if let Err(e) = &result {
            warn!("❌ Donation {} failed while {}", donation.id, e);
        }

        DonationOutcome {
            donation_id: donation.id.clone(),
            constituent,
            result,
        }
    }

    async fn run(
        &self,
        donation: &Donation,
        cache: &mut GiftCache,
        constituent: &mut Option<ResolvedConstituent>,
    ) -> Result<GiftOutcome, ReconcileError> {
        let resolved = self
            .constituents
            .resolve(donation)
            .await
            .stage(Stage::ResolveConstituent)?;
        let constituent_id = resolved.id.clone();
        *constituent = Some(resolved);

        if let Some(existing) = self
            .duplicates
            .find(&constituent_id, donation, cache)
            .await
            .stage(Stage::DetectDuplicate)?
        {
            info!("⏭️  Donation {} already recorded as gift {}", donation.id, existing.id);
            return Ok(GiftOutcome {
                action: GiftAction::SkippedExisting,
                gift_id: existing.id,
            });
        }

        let context = self
            .recurring
            .resolve(&constituent_id, donation, cache)
            .await
            .stage(Stage::ResolveRecurring)?;

        let mut gift = self
            .mapper
            .map(donation, &context)
            .stage(Stage::MapGift)?;
        gift.constituent_id = constituent_id;

        let gift_id = self
            .sink
            .create_gift(&gift)
            .await
            .stage(Stage::CreateGift)?;
        info!(
            "✅ Created {} gift {} for donation {}",
            gift.gift_type, gift_id, donation.id
        );

        cache.record(Gift {
            id: gift_id.clone(),
            ..gift
        });

        Ok(GiftOutcome {
            action: GiftAction::Created,
            gift_id,
        })
    }
}
