//! CanaryWatch daemon binary entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use canarywatch_core::canary::CanaryStore;
use canarywatch_core::config::WatchConfig;
use canarywatch_core::signals::health::MetadataSource;
use canarywatch_core::{CanaryStatus, SecretKey};
use canarywatch_daemon::source::{HttpMetadataSource, UnconfiguredSource};
use canarywatch_daemon::Daemon;

/// Environment variable carrying the hex-encoded canary signing key.
const SECRET_ENV: &str = "CANARYWATCH_SECRET";
/// Environment variable carrying the replacement key for `rekey`.
const NEXT_SECRET_ENV: &str = "CANARYWATCH_SECRET_NEXT";

/// CanaryWatch - tamper-evident integrity tripwire.
#[derive(Parser, Debug)]
#[command(name = "canarywatch", version, about)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "~/.config/canarywatch/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<WatchCommand>,
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    /// Run the daemon (integrity and noise schedulers).
    Run,
    /// Write the first canary record, or re-establish trust after a tamper
    /// finding has been investigated.
    Init,
    /// Swap the signing key (from CANARYWATCH_SECRET_NEXT) and immediately
    /// rewrite the canary under it.
    Rekey,
    /// One-shot canary check. Exits non-zero unless the status is OK.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("CANARYWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = WatchConfig::load(&expand_tilde(&args.config))?;

    match args.command.unwrap_or(WatchCommand::Run) {
        WatchCommand::Run => run_daemon(config).await,
        WatchCommand::Init => {
            let mut store = open_store(&config)?;
            let record = store.write_canary()?;
            println!(
                "canary initialized at {} (sequence {})",
                config.canary_path.display(),
                record.sequence
            );
            Ok(())
        }
        WatchCommand::Rekey => {
            let mut store = open_store(&config)?;
            let next = secret_from_env(NEXT_SECRET_ENV)?;
            let record = store.rekey(next)?;
            println!("canary re-keyed (sequence {})", record.sequence);
            Ok(())
        }
        WatchCommand::Check => {
            let store = open_store(&config)?;
            let status = store.check_canary();
            println!("{status}");
            if status != CanaryStatus::Ok {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn run_daemon(config: WatchConfig) -> Result<()> {
    let key = secret_from_env(SECRET_ENV)?;

    let source: Arc<dyn MetadataSource> = match &config.metadata.url {
        Some(url) => Arc::new(HttpMetadataSource::new(url.clone(), config.fetch_timeout())?),
        None => {
            warn!("no metadata URL configured; repository probes will score fail-safe maximum risk");
            Arc::new(UnconfiguredSource)
        }
    };

    let (daemon, mut escalations) = Daemon::new(config, key, source)?;

    // Default escalation consumer: log loudly. Deployments that alert, lock
    // down, or redeploy attach their own consumer to this channel instead.
    tokio::spawn(async move {
        while let Some(snapshot) = escalations.recv().await {
            error!(
                composite = snapshot.composite,
                level = %snapshot.level,
                "escalation triggered"
            );
        }
    });

    daemon.run().await;
    Ok(())
}

fn open_store(config: &WatchConfig) -> Result<CanaryStore> {
    let key = secret_from_env(SECRET_ENV)?;
    Ok(CanaryStore::new(
        &config.canary_path,
        key,
        config.staleness_threshold(),
        config.rewrite_min_interval(),
    ))
}

fn secret_from_env(var: &str) -> Result<SecretKey> {
    let raw = std::env::var(var)
        .with_context(|| format!("{var} is not set; supply the 64-hex-char canary signing key"))?;
    Ok(SecretKey::from_hex(&raw)?)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
