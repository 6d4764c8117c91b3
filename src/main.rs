use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use giftbridge::{bootstrap, config};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "giftbridge", version, about = "Sync donations into the CRM as gifts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process new donations, or finish an interrupted batch
    Run {
        /// Log intended CRM writes without performing them
        #[arg(long)]
        dry_run: bool,
        /// Fetch donations created at or after this RFC 3339 instant
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Authorize against the CRM and store the refresh token
    Auth {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Print the authorize URL without launching a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Write a configuration template
    Init {
        #[arg(long, default_value = ".env")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,giftbridge=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { dry_run, since } => run(dry_run, since).await,
        Command::Auth { port, no_browser } => {
            let settings = config::Settings::from_env()?;
            settings.validate_for_auth()?;
            let mut authorizer = bootstrap::initialize_authorizer(&settings, port)?;
            if no_browser {
                authorizer = authorizer.without_browser();
            }
            authorizer.run().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Init { path, force } => {
            config::write_template(&path, force)?;
            println!("Wrote configuration template to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(dry_run: bool, since: Option<DateTime<Utc>>) -> anyhow::Result<ExitCode> {
    info!("🚀 Starting giftbridge sync{}", if dry_run { " (dry run)" } else { "" });

    let settings = config::Settings::from_env()?;
    settings.validate_for_sync()?;
    let runner = bootstrap::initialize_runner(&settings, dry_run)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️  Interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    let summary = match runner.run(since, &cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("❌ Sync aborted: {}", e);
            return Err(e.into());
        }
    };

    println!("{}", summary);
    if summary.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_flags() {
        let cli = Cli::try_parse_from(["giftbridge", "auth"]).unwrap();
        assert!(matches!(cli.command, Command::Auth { port: 8080, no_browser: false }));

        let cli = Cli::try_parse_from(["giftbridge", "auth", "--port", "9000", "--no-browser"]).unwrap();
        assert!(matches!(cli.command, Command::Auth { port: 9000, no_browser: true }));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "giftbridge",
            "run",
            "--dry-run",
            "--since",
            "2024-03-01T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Command::Run { dry_run, since } => {
                assert!(dry_run);
                assert_eq!(since.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
            }
            _ => panic!("expected run"),
        }
    }
}
