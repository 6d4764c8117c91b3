pub mod constituent;
pub mod duplicate;
pub mod engine;
pub mod gift_cache;
pub mod mapper;
pub mod recurring;

pub use constituent::{ConstituentResolver, ResolvedConstituent};
pub use duplicate::DuplicateDetector;
pub use engine::{DonationOutcome, GiftAction, GiftOutcome, ReconciliationEngine};
pub use gift_cache::GiftCache;
pub use mapper::{GiftDefaults, GiftMapper};
pub use recurring::{RecurringContext, RecurringContextResolver};
