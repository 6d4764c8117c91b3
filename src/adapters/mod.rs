pub mod dry_run;
pub mod traits;

pub use dry_run::{DryRunCheckpointStore, DryRunSink};
pub use traits::{CheckpointStore, CredentialStore, DestinationSink, DonationSource};

use crate::error::{AppError, AppResult};

/// Passes 2xx responses through and turns anything else into `UnexpectedStatus`.
pub(crate) async fn ensure_success(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}
