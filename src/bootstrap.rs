use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    adapters::{
        CheckpointStore, CredentialStore, DestinationSink, DonationSource, DryRunCheckpointStore,
        DryRunSink,
    },
    auth::{Authorizer, OAuthRefresher, TokenCache},
    batch::BatchRunner,
    config::Settings,
    crm::CrmClient,
    error::AppResult,
    reconcile::{GiftMapper, ReconciliationEngine},
    source::DonationPlatformClient,
    storage::{FileCheckpointStore, FileCredentialStore},
};

/// Wires the production collaborators into a batch runner.
pub fn initialize_runner(settings: &Settings, dry_run: bool) -> AppResult<BatchRunner> {
    info!("Initializing application components ...");
    let timeout = settings.http_timeout();

    // Auth
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(settings.token_file()));
    let refresher = Arc::new(OAuthRefresher::new(
        &settings.crm.token_url,
        &settings.crm.client_id,
        &settings.crm.client_secret,
        timeout,
    )?);
    let tokens = Arc::new(TokenCache::new(credentials, refresher));
    info!("✅ Token cache initialized");

    // Remote APIs
    let source: Arc<dyn DonationSource> = Arc::new(DonationPlatformClient::new(
        &settings.source.base_url,
        &settings.source.api_key,
        timeout,
    )?);
    let crm: Arc<dyn DestinationSink> = Arc::new(CrmClient::new(
        &settings.crm.api_base_url,
        &settings.crm.subscription_key,
        tokens,
        timeout,
    )?);
    info!("✅ Donation platform and CRM clients initialized");

    let checkpoint: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(
        settings.checkpoint_file(),
        settings.sync.max_batch_size,
    ));

    let (sink, checkpoint): (Arc<dyn DestinationSink>, Arc<dyn CheckpointStore>) = if dry_run {
        warn!("[DRY-RUN] CRM writes and checkpoint updates are disabled");
        (
            Arc::new(DryRunSink::new(crm)),
            Arc::new(DryRunCheckpointStore::new(checkpoint)),
        )
    } else {
        (crm, checkpoint)
    };

    let engine = ReconciliationEngine::new(sink, GiftMapper::new(settings.gift_defaults()));
    info!("✓ Reconciliation engine ready");

    Ok(BatchRunner::new(
        source,
        checkpoint,
        engine,
        settings.runner_config(),
    ))
}

pub fn initialize_authorizer(settings: &Settings, port: u16) -> AppResult<Authorizer> {
    let refresher = OAuthRefresher::new(
        &settings.crm.token_url,
        &settings.crm.client_id,
        &settings.crm.client_secret,
        settings.http_timeout(),
    )?;
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(settings.token_file()));

    Ok(Authorizer::new(
        refresher,
        credentials,
        &settings.crm.authorize_url,
        &settings.crm.client_id,
        port,
    ))
}
