pub mod client;
pub mod models;

pub use client::DonationPlatformClient;
pub use models::{Donation, Supporter};
