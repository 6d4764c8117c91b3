use std::sync::Arc;

use crate::adapters::traits::DestinationSink;
use crate::crm::models::Gift;
use crate::error::AppResult;
use crate::reconcile::gift_cache::GiftCache;
use crate::source::models::Donation;

/// Idempotency guard: has this donation already produced a gift?
pub struct DuplicateDetector {
    sink: Arc<dyn DestinationSink>,
}

impl DuplicateDetector {
    pub fn new(sink: Arc<dyn DestinationSink>) -> Self {
        Self { sink }
    }

    pub async fn find(
        &self,
        constituent_id: &str,
        donation: &Donation,
        cache: &mut GiftCache,
    ) -> AppResult<Option<Gift>> {
        let gifts = cache.gifts_for(self.sink.as_ref(), constituent_id).await?;

        for gift in gifts {
            if is_gift_for(gift, donation)? {
                return Ok(Some(gift.clone()));
            }
        }
        Ok(None)
    }
}

/// Recurring gifts share the series id as lookup id, so they are told apart by origin.
pub fn is_gift_for(gift: &Gift, donation: &Donation) -> AppResult<bool> {
    match donation.series_id() {
        None => Ok(gift.lookup_id == donation.id),
        Some(series_id) => {
            if gift.lookup_id != series_id {
                return Ok(false);
            }
            Ok(gift.origin()?.donation_id == donation.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::models::{GiftOrigin, GiftType};
    use crate::error::{AppError, ValidationError};
    use crate::testing::{donation, installment, FakeCrm};

    fn existing(id: &str, lookup_id: &str, origin_donation: Option<&str>) -> Gift {
        Gift {
            id: id.into(),
            constituent_id: "c-1".into(),
            lookup_id: lookup_id.into(),
            origin: origin_donation
                .map(|d| GiftOrigin::new(d, "FundraiseUp").encode().unwrap())
                .unwrap_or_default(),
            gift_type: GiftType::RecurringGift,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_one_off_matched_by_lookup_id() {
        let crm = Arc::new(FakeCrm::default());
        crm.add_gift(existing("g-1", "d1", None));
        let detector = DuplicateDetector::new(crm.clone());
        let mut cache = GiftCache::new();

        let found = detector.find("c-1", &donation("d1", "5"), &mut cache).await.unwrap();
        assert_eq!(found.unwrap().id, "g-1");

        let missing = detector.find("c-1", &donation("d2", "5"), &mut cache).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(crm.gift_list_calls(), 1);
    }

    #[tokio::test]
    async fn test_recurring_matched_by_series_and_origin() {
        let crm = Arc::new(FakeCrm::default());
        crm.add_gift(existing("g-1", "s1", Some("r1")));
        crm.add_gift(existing("g-2", "s1", Some("r2")));
        let detector = DuplicateDetector::new(crm);
        let mut cache = GiftCache::new();

        let found = detector
            .find("c-1", &installment("r2", "s1", 2), &mut cache)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, "g-2");

        let fresh = detector
            .find("c-1", &installment("r3", "s1", 3), &mut cache)
            .await
            .unwrap();
        assert!(fresh.is_none());
    }

    #[test]
    fn test_recurring_ignores_one_off_lookup_collision() {
        // Lookup id equal to the donation id is not a match for a recurring donation
        let gift = existing("g-1", "r1", None);
        assert!(!is_gift_for(&gift, &installment("r1", "s1", 1)).unwrap());
    }

    #[test]
    fn test_malformed_origin_surfaces() {
        let mut gift = existing("g-1", "s1", None);
        gift.origin = "{broken".into();

        let err = is_gift_for(&gift, &installment("r1", "s1", 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::MalformedOrigin(_))));
    }
}
