pub mod client;
pub mod models;

pub use client::CrmClient;
pub use models::{Constituent, Gift, GiftOrigin, GiftType};
