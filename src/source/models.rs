use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed donation as reported by the payment platform
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    pub id: String,
    /// Decimal string, e.g. "50.00"
    pub amount: String,
    #[serde(default)]
    pub currency: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub supporter: Option<Supporter>,
    #[serde(default)]
    pub recurring_plan: Option<RecurringPlan>,
    /// Installment number within a recurring plan, e.g. "2"
    #[serde(default)]
    pub installment: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub campaign: Option<Campaign>,
    #[serde(default)]
    pub designation: Option<Designation>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Donation {
    pub fn is_recurring(&self) -> bool {
        self.series_id().is_some()
    }

    /// Recurring plan id, when the plan is present and has one
    pub fn series_id(&self) -> Option<&str> {
        self.recurring_plan
            .as_ref()
            .map(|plan| plan.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// 1-based position in the series. Missing or unparseable values count as 1.
    pub fn sequence_number(&self) -> u32 {
        self.installment
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(|n| n.clamp(1, u32::MAX as i64) as u32)
            .unwrap_or(1)
    }

    pub fn donor_email(&self) -> Option<&str> {
        self.supporter
            .as_ref()
            .map(|s| s.email.trim())
            .filter(|email| !email.is_empty())
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment.as_ref().map(|p| p.method.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Supporter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Option<SupporterAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SupporterAddress {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecurringPlan {
    pub id: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_installment_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Designation {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One page of the donation listing endpoint
#[derive(Debug, Deserialize)]
pub struct DonationPage {
    #[serde(default)]
    pub data: Vec<Donation>,
    #[serde(default)]
    pub has_more: bool,
}
