use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ValidationError};

// ========== Gifts ==========

/// Gift type as understood by the CRM. Unknown values survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GiftType {
    Donation,
    RecurringGift,
    RecurringGiftPayment,
    Other(String),
}

impl GiftType {
    pub fn as_str(&self) -> &str {
        match self {
            GiftType::Donation => "Donation",
            GiftType::RecurringGift => "RecurringGift",
            GiftType::RecurringGiftPayment => "RecurringGiftPayment",
            GiftType::Other(value) => value,
        }
    }
}

impl Default for GiftType {
    fn default() -> Self {
        GiftType::Donation
    }
}

impl From<String> for GiftType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Donation" => GiftType::Donation,
            "RecurringGift" => GiftType::RecurringGift,
            "RecurringGiftPayment" => GiftType::RecurringGiftPayment,
            _ => GiftType::Other(value),
        }
    }
}

impl From<&str> for GiftType {
    fn from(value: &str) -> Self {
        GiftType::from(value.to_string())
    }
}

impl From<GiftType> for String {
    fn from(value: GiftType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SUBTYPE_RECURRING: &str = "Recurring";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GiftAmount {
    pub value: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GiftSplit {
    pub amount: GiftAmount,
    pub fund_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub campaign_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub appeal_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Gift {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub amount: GiftAmount,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub batch_prefix: String,
    #[serde(default)]
    pub constituent_id: String,
    /// YYYY-MM-DD
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gift_splits: Vec<GiftSplit>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_manual: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_gifts: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lookup_id: String,
    /// Encoded [`GiftOrigin`]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(rename = "type", default)]
    pub gift_type: GiftType,
}

impl Gift {
    pub fn origin(&self) -> AppResult<GiftOrigin> {
        GiftOrigin::decode(&self.origin)
    }
}

/// Provenance record stored on recurring gifts, since they share a lookup id
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiftOrigin {
    #[serde(default)]
    pub donation_id: String,
    #[serde(default)]
    pub name: String,
}

impl GiftOrigin {
    pub fn new(donation_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            donation_id: donation_id.into(),
            name: name.into(),
        }
    }

    pub fn encode(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// An empty string decodes to the zero value.
    pub fn decode(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| ValidationError::MalformedOrigin(format!("{}: {}", raw, e)).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct GiftListResponse {
    #[serde(default)]
    pub value: Vec<Gift>,
    #[serde(default)]
    pub next_link: Option<String>,
}

// ========== Constituents ==========

pub const CONSTITUENT_TYPE_INDIVIDUAL: &str = "Individual";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Constituent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "first", default)]
    pub first_name: String,
    #[serde(rename = "last", default)]
    pub last_name: String,
    #[serde(rename = "type", default)]
    pub constituent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Phone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Email {
    pub address: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(rename = "type", default)]
    pub email_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Phone {
    pub number: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(rename = "type", default)]
    pub phone_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(default)]
    pub address_lines: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub post_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(rename = "type", default)]
    pub address_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ConstituentSearchResponse {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub value: Vec<Constituent>,
}

/// Body returned by create endpoints
#[derive(Debug, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}
