use std::fmt;

use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("External error: {0}")]
    ExternalError(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Fatal errors abort the whole run instead of being charged to one donation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Auth(_) | AppError::Checkpoint(_) | AppError::Cancelled
        )
    }
}

/// Donation-level data problems. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("donation has no supporter information")]
    NoDonorInfo,

    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("malformed origin: {0}")]
    MalformedOrigin(String),

    #[error(
        "recurring series {series_id} has {existing} gift(s) at the destination but no RecurringGift anchor"
    )]
    OrphanedSeries { series_id: String, existing: usize },
}

/// Step of the per-donation pipeline an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchDonation,
    ResolveConstituent,
    DetectDuplicate,
    ResolveRecurring,
    MapGift,
    CreateGift,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::FetchDonation => "fetching donation",
            Stage::ResolveConstituent => "resolving constituent",
            Stage::DetectDuplicate => "checking for existing gift",
            Stage::ResolveRecurring => "resolving recurring context",
            Stage::MapGift => "mapping donation to gift",
            Stage::CreateGift => "creating gift",
        };
        f.write_str(label)
    }
}

/// Per-donation failure labelled with the pipeline stage
#[derive(Error, Debug)]
#[error("{stage}: {source}")]
pub struct ReconcileError {
    pub stage: Stage,
    #[source]
    pub source: AppError,
}

impl ReconcileError {
    pub fn new(stage: Stage, source: AppError) -> Self {
        Self { stage, source }
    }

    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// Extension for tagging a result with the stage it failed in
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, ReconcileError>;
}

impl<T, E: Into<AppError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, ReconcileError> {
        self.map_err(|e| ReconcileError::new(stage, e.into()))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
