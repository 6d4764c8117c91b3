use std::fmt;

use serde::Serialize;

use crate::error::ReconcileError;
use crate::reconcile::engine::{DonationOutcome, GiftAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum RunMode {
    #[default]
    Fresh,
    Resuming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationError {
    pub donation_id: String,
    pub message: String,
}

/// Counts and per-donation failures for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub mode: RunMode,
    pub donations_processed: usize,
    pub constituents_created: usize,
    pub constituents_matched: usize,
    pub gifts_created: usize,
    pub gifts_updated: usize,
    pub gifts_skipped: usize,
    pub errors: Vec<DonationError>,
}

impl BatchSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &DonationOutcome) {
        self.donations_processed += 1;

        if let Some(constituent) = &outcome.constituent {
            if constituent.created {
                self.constituents_created += 1;
            } else {
                self.constituents_matched += 1;
            }
        }

        match &outcome.result {
            Ok(gift) => match gift.action {
                GiftAction::Created => self.gifts_created += 1,
                GiftAction::SkippedExisting => self.gifts_skipped += 1,
            },
            Err(e) => self.push_error(&outcome.donation_id, e),
        }
    }

    /// A donation that never reached the engine, e.g. a failed re-fetch
    pub fn record_failure(&mut self, donation_id: &str, error: &ReconcileError) {
        self.donations_processed += 1;
        self.push_error(donation_id, error);
    }

    fn push_error(&mut self, donation_id: &str, error: &ReconcileError) {
        self.errors.push(DonationError {
            donation_id: donation_id.to_string(),
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sync summary ({:?})", self.mode)?;
        writeln!(f, "  Donations processed:   {}", self.donations_processed)?;
        writeln!(f, "  Constituents created:  {}", self.constituents_created)?;
        writeln!(f, "  Constituents existing: {}", self.constituents_matched)?;
        writeln!(f, "  Gifts created:         {}", self.gifts_created)?;
        writeln!(f, "  Gifts updated:         {}", self.gifts_updated)?;
        writeln!(f, "  Gifts skipped:         {}", self.gifts_skipped)?;
        write!(f, "  Errors:                {}", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n    - {}: {}", error.donation_id, error.message)?;
        }
        Ok(())
    }
}
