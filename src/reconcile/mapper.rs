use std::str::FromStr;

use rust_decimal::Decimal;

use crate::crm::models::{Gift, GiftAmount, GiftOrigin, GiftSplit, GiftType, SUBTYPE_RECURRING};
use crate::error::{AppResult, ValidationError};
use crate::reconcile::recurring::RecurringContext;
use crate::source::models::Donation;

/// Static gift fields taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GiftDefaults {
    pub fund_id: String,
    pub campaign_id: String,
    pub appeal_id: String,
    /// Type used for one-off donations
    pub gift_type: GiftType,
    pub batch_prefix: String,
    pub is_manual: bool,
    /// Name recorded in the origin of recurring gifts
    pub source_name: String,
}

impl Default for GiftDefaults {
    fn default() -> Self {
        Self {
            fund_id: String::new(),
            campaign_id: String::new(),
            appeal_id: String::new(),
            gift_type: GiftType::Donation,
            batch_prefix: "FundraiseUp".to_string(),
            is_manual: true,
            source_name: "FundraiseUp".to_string(),
        }
    }
}

/// Pure conversion of a donation into a CRM gift
#[derive(Debug, Clone)]
pub struct GiftMapper {
    defaults: GiftDefaults,
}

impl GiftMapper {
    pub fn new(defaults: GiftDefaults) -> Self {
        Self { defaults }
    }

    /// The returned gift has no constituent id yet.
    pub fn map(&self, donation: &Donation, context: &RecurringContext) -> AppResult<Gift> {
        let amount = parse_amount(&donation.amount)?;

        let mut gift = Gift {
            amount: GiftAmount { value: amount },
            batch_prefix: self.defaults.batch_prefix.clone(),
            date: donation.created_at.format("%Y-%m-%d").to_string(),
            gift_splits: vec![GiftSplit {
                amount: GiftAmount { value: amount },
                fund_id: self.defaults.fund_id.clone(),
                campaign_id: self.defaults.campaign_id.clone(),
                appeal_id: self.defaults.appeal_id.clone(),
            }],
            is_manual: self.defaults.is_manual,
            payment_method: donation
                .payment_method()
                .filter(|m| !m.is_empty())
                .map(payment_method_label)
                .unwrap_or_default()
                .to_string(),
            reference: donation.comment.clone().unwrap_or_default(),
            ..Default::default()
        };

        match donation.series_id() {
            None => {
                gift.gift_type = self.defaults.gift_type.clone();
                gift.lookup_id = donation.id.clone();
            }
            Some(series_id) => {
                gift.lookup_id = series_id.to_string();
                gift.subtype = SUBTYPE_RECURRING.to_string();
                gift.origin =
                    GiftOrigin::new(&donation.id, &self.defaults.source_name).encode()?;

                if context.is_first {
                    gift.gift_type = GiftType::RecurringGift;
                } else {
                    gift.gift_type = GiftType::RecurringGiftPayment;
                    if !context.anchor_gift_id.is_empty() {
                        gift.linked_gifts = vec![context.anchor_gift_id.clone()];
                    }
                }
            }
        }

        Ok(gift)
    }
}

fn parse_amount(raw: &str) -> AppResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| {
        ValidationError::InvalidAmount {
            amount: raw.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// CRM payment method label for a platform payment method tag
pub fn payment_method_label(method: &str) -> &'static str {
    match method {
        "credit_card" | "apple_pay" | "google_pay" => "Credit card",
        "bacs_direct_debit" | "ach" | "sepa_direct_debit" => "Direct debit",
        "paypal" => "PayPal",
        _ => "Other",
    }
}
