pub mod runner;
pub mod summary;

pub use runner::{BatchRunner, RunnerConfig};
pub use summary::{BatchSummary, DonationError, RunMode};
