use std::sync::Arc;

use tracing::warn;

use crate::adapters::traits::DestinationSink;
use crate::crm::models::GiftType;
use crate::error::{AppResult, ValidationError};
use crate::reconcile::gift_cache::GiftCache;
use crate::source::models::Donation;

/// Where a donation sits in its recurring series.
/// The zero value describes a one-off donation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurringContext {
    pub sequence_number: u32,
    pub is_first: bool,
    /// Id of the series' RecurringGift. Empty when this donation is the anchor.
    pub anchor_gift_id: String,
}

impl RecurringContext {
    fn first(sequence_number: u32) -> Self {
        Self {
            sequence_number,
            is_first: true,
            anchor_gift_id: String::new(),
        }
    }
}

pub struct RecurringContextResolver {
    sink: Arc<dyn DestinationSink>,
}

impl RecurringContextResolver {
    pub fn new(sink: Arc<dyn DestinationSink>) -> Self {
        Self { sink }
    }

    pub async fn resolve(
        &self,
        constituent_id: &str,
        donation: &Donation,
        cache: &mut GiftCache,
    ) -> AppResult<RecurringContext> {
        let Some(series_id) = donation.series_id() else {
            return Ok(RecurringContext::default());
        };

        let sequence_number = donation.sequence_number();
        if sequence_number == 1 {
            return Ok(RecurringContext::first(sequence_number));
        }

        let gifts = cache.gifts_for(self.sink.as_ref(), constituent_id).await?;
        let series: Vec<_> = gifts.iter().filter(|g| g.lookup_id == series_id).collect();

        if let Some(anchor) = series
            .iter()
            .find(|g| g.gift_type == GiftType::RecurringGift)
        {
            return Ok(RecurringContext {
                sequence_number,
                is_first: false,
                anchor_gift_id: anchor.id.clone(),
            });
        }

        if !series.is_empty() {
            warn!(
                "⚠️  Series {} has {} gift(s) but no anchor, refusing to start a second one",
                series_id,
                series.len()
            );
            return Err(ValidationError::OrphanedSeries {
                series_id: series_id.to_string(),
                existing: series.len(),
            }
            .into());
        }

        warn!(
            "⚠️  No anchor for series {} at installment {}, treating donation {} as the first",
            series_id, sequence_number, donation.id
        );
        Ok(RecurringContext::first(sequence_number))
    }
}
