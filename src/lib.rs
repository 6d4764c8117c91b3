pub mod adapters;
pub mod auth;
pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod crm;
pub mod error;
pub mod reconcile;
pub mod server;
pub mod source;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AppError, AppResult};
