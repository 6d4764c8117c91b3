use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::batch::RunnerConfig;
use crate::error::{AppError, AppResult};
use crate::reconcile::GiftDefaults;

pub const ENV_PREFIX: &str = "GIFTBRIDGE";

/// Upper bound on `sync.lookback_days`, about ten years.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub source: SourceSettings,
    pub crm: CrmSettings,
    pub gift: GiftSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    /// Recorded in the origin of recurring gifts
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrmSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub subscription_key: String,
    pub api_base_url: String,
    pub token_url: String,
    pub authorize_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GiftSettings {
    #[serde(default)]
    pub fund_id: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub appeal_id: String,
    pub gift_type: String,
    pub batch_prefix: String,
    pub is_manual: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub max_batch_size: usize,
    pub lookback_days: i64,
    pub http_timeout_secs: u64,
    pub state_dir: PathBuf,
}

impl Settings {
    /// Defaults overlaid with `GIFTBRIDGE_*` variables, e.g. `GIFTBRIDGE_CRM__CLIENT_ID`.
    pub fn from_env() -> AppResult<Self> {
        Self::load(environment())
    }

    fn load(env: Environment) -> AppResult<Self> {
        let settings = Config::builder()
            // Donation platform
            .set_default("source.base_url", crate::source::client::DEFAULT_BASE_URL)?
            .set_default("source.name", "FundraiseUp")?
            // CRM
            .set_default("crm.api_base_url", crate::crm::client::DEFAULT_API_BASE_URL)?
            .set_default("crm.token_url", "https://oauth2.sky.blackbaud.com/token")?
            .set_default("crm.authorize_url", "https://app.blackbaud.com/oauth/authorize")?
            // Gift defaults
            .set_default("gift.gift_type", "Donation")?
            .set_default("gift.batch_prefix", "FundraiseUp")?
            .set_default("gift.is_manual", true)?
            // Batch behaviour
            .set_default("sync.max_batch_size", 300)?
            .set_default("sync.lookback_days", 30)?
            .set_default("sync.http_timeout_secs", 30)?
            .set_default("sync.state_dir", ".giftbridge")?
            .add_source(env)
            .build()?
            .try_deserialize::<Settings>()?;

        Ok(settings)
    }

    /// Everything `run` needs. All problems are reported at once.
    pub fn validate_for_sync(&self) -> AppResult<()> {
        let mut problems = self.missing_crm_credentials();

        if self.source.api_key.trim().is_empty() {
            problems.push("source.api_key is required".to_string());
        }
        if self.crm.subscription_key.trim().is_empty() {
            problems.push("crm.subscription_key is required".to_string());
        }
        if self.gift.fund_id.trim().is_empty() {
            problems.push("gift.fund_id is required".to_string());
        }
        if self.sync.max_batch_size == 0 {
            problems.push("sync.max_batch_size must be at least 1".to_string());
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.sync.lookback_days) {
            problems.push(format!(
                "sync.lookback_days must be between 1 and {}",
                MAX_LOOKBACK_DAYS
            ));
        }

        into_result(problems)
    }

    /// Everything the interactive `auth` command needs.
    pub fn validate_for_auth(&self) -> AppResult<()> {
        into_result(self.missing_crm_credentials())
    }

    fn missing_crm_credentials(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.crm.client_id.trim().is_empty() {
            problems.push("crm.client_id is required".to_string());
        }
        if self.crm.client_secret.trim().is_empty() {
            problems.push("crm.client_secret is required".to_string());
        }
        problems
    }

    pub fn gift_defaults(&self) -> GiftDefaults {
        GiftDefaults {
            fund_id: self.gift.fund_id.clone(),
            campaign_id: self.gift.campaign_id.clone(),
            appeal_id: self.gift.appeal_id.clone(),
            gift_type: self.gift.gift_type.as_str().into(),
            batch_prefix: self.gift.batch_prefix.clone(),
            is_manual: self.gift.is_manual,
            source_name: self.source.name.clone(),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_batch_size: self.sync.max_batch_size,
            lookback: chrono::Duration::days(self.sync.lookback_days.clamp(1, MAX_LOOKBACK_DAYS)),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.http_timeout_secs)
    }

    pub fn token_file(&self) -> PathBuf {
        self.sync.state_dir.join("refresh_token")
    }

    pub fn checkpoint_file(&self) -> PathBuf {
        self.sync.state_dir.join("checkpoint.json")
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn into_result(problems: Vec<String>) -> AppResult<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(problems.join("; ")))
    }
}

pub const ENV_TEMPLATE: &str = "\
# giftbridge configuration
# Values here are loaded into the environment before GIFTBRIDGE_* variables are read.

# Donation platform
GIFTBRIDGE_SOURCE__API_KEY=
# GIFTBRIDGE_SOURCE__BASE_URL=https://api.fundraiseup.com/v1

# CRM OAuth application and API subscription
GIFTBRIDGE_CRM__CLIENT_ID=
GIFTBRIDGE_CRM__CLIENT_SECRET=
GIFTBRIDGE_CRM__SUBSCRIPTION_KEY=

# Gift defaults
GIFTBRIDGE_GIFT__FUND_ID=
# GIFTBRIDGE_GIFT__CAMPAIGN_ID=
# GIFTBRIDGE_GIFT__APPEAL_ID=
# GIFTBRIDGE_GIFT__GIFT_TYPE=Donation

# Batch behaviour
# GIFTBRIDGE_SYNC__MAX_BATCH_SIZE=300
# GIFTBRIDGE_SYNC__LOOKBACK_DAYS=30
# GIFTBRIDGE_SYNC__STATE_DIR=.giftbridge
";

/// Writes the `.env` template, refusing to clobber an existing file unless forced.
pub fn write_template(path: &Path, force: bool) -> AppResult<()> {
    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists, pass --force to overwrite",
            path.display()
        )));
    }
    std::fs::write(path, ENV_TEMPLATE)?;
    Ok(())
}
