use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::traits::DestinationSink;
use crate::crm::models::{Address, Constituent, Email, Phone, CONSTITUENT_TYPE_INDIVIDUAL};
use crate::error::{AppResult, ValidationError};
use crate::source::models::{Donation, Supporter, SupporterAddress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConstituent {
    pub id: String,
    pub created: bool,
}

/// Finds the donor in the CRM by email, creating them when absent
pub struct ConstituentResolver {
    sink: Arc<dyn DestinationSink>,
}

impl ConstituentResolver {
    pub fn new(sink: Arc<dyn DestinationSink>) -> Self {
        Self { sink }
    }

    pub async fn resolve(&self, donation: &Donation) -> AppResult<ResolvedConstituent> {
        let supporter = donation
            .supporter
            .as_ref()
            .ok_or(ValidationError::NoDonorInfo)?;

        if let Some(email) = donation.donor_email() {
            let matches = self.sink.find_constituents_by_email(email).await?;
            if let Some(existing) = matches.into_iter().find(|c| !c.id.is_empty()) {
                debug!("✓ Matched constituent {} by email", existing.id);
                return Ok(ResolvedConstituent {
                    id: existing.id,
                    created: false,
                });
            }
        }

        let id = self
            .sink
            .create_constituent(&constituent_from_supporter(supporter))
            .await?;
        info!("👤 Created constituent {} for supporter {}", id, supporter.id);

        Ok(ResolvedConstituent { id, created: true })
    }
}

pub fn constituent_from_supporter(supporter: &Supporter) -> Constituent {
    let email = Some(supporter.email.trim())
        .filter(|e| !e.is_empty())
        .map(|address| Email {
            address: address.to_string(),
            primary: true,
            email_type: "Email".into(),
        });

    let phone = Some(supporter.phone.trim())
        .filter(|p| !p.is_empty())
        .map(|number| Phone {
            number: number.to_string(),
            primary: true,
            phone_type: "Mobile".into(),
        });

    Constituent {
        id: String::new(),
        first_name: supporter.first_name.clone(),
        last_name: supporter.last_name.clone(),
        constituent_type: CONSTITUENT_TYPE_INDIVIDUAL.into(),
        email,
        phone,
        address: supporter.address.as_ref().map(address_from_supporter),
    }
}

fn address_from_supporter(address: &SupporterAddress) -> Address {
    let address_lines = if address.line2.is_empty() {
        address.line1.clone()
    } else {
        format!("{}\n{}", address.line1, address.line2)
    };

    Address {
        address_lines,
        city: address.city.clone(),
        state: address.region.clone(),
        post_code: address.postal_code.clone(),
        country: address.country.clone(),
        primary: true,
        address_type: "Home".into(),
    }
}
