// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! redis-keysync - copy keys missing on a target Redis from a source Redis.
//!
//! Every option can be given as a flag or an environment variable:
//!
//! ```bash
//! REDIS_ENDPOINT=10.0.0.1:6379 REDIS_TARGET_ENDPOINT=10.0.0.2:6379 \
//! DRY_RUN=no INTERVAL=30 REDIS_NAMESPACE='session:*' redis-keysync sync
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redis_keysync::config::{parse_switch, StoreSettings, SyncConfig};
use redis_keysync::{Endpoint, Mode, RedisStore, Result, RetryConfig, Runner};

/// Copy keys missing on a target Redis from a source Redis
#[derive(Parser)]
#[command(name = "redis-keysync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Only report missing keys, never write (yes/no)
    #[arg(long, env = "DRY_RUN", default_value = "yes", value_parser = parse_switch, action = clap::ArgAction::Set)]
    dry_run: bool,

    /// Seconds between cycles; 0 or less runs a single cycle
    #[arg(long, env = "INTERVAL", default_value_t = 30, allow_negative_numbers = true)]
    interval: i64,

    /// Source endpoint (host:port)
    #[arg(long, env = "REDIS_ENDPOINT", default_value = "localhost:6379")]
    source: String,

    /// Target endpoint (host:port), or "none"
    #[arg(long, env = "REDIS_TARGET_ENDPOINT", default_value = "none")]
    target: String,

    /// Glob pattern selecting the keys to sync
    #[arg(long, env = "REDIS_NAMESPACE", default_value = "*")]
    namespace: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// SCAN COUNT hint
    #[arg(long, env = "SCAN_COUNT", default_value_t = 1000)]
    scan_count: usize,

    /// Keys per GET/TTL pipeline
    #[arg(long, env = "FETCH_BATCH_SIZE", default_value_t = 500)]
    fetch_batch_size: usize,

    /// Connect timeout per attempt (e.g. "5s", "500ms")
    #[arg(long, env = "CONNECT_TIMEOUT", default_value = "5s")]
    connect_timeout: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy keys missing on the target from the source
    Sync,

    /// Report key sets on the source (and target, if set) without writing
    Monitor,
}

impl Cli {
    fn mode(&self) -> Mode {
        match self.command {
            Commands::Sync => Mode::Sync,
            Commands::Monitor => Mode::Monitor,
        }
    }

    fn sync_config(&self) -> Result<SyncConfig> {
        Ok(SyncConfig {
            dry_run: self.dry_run,
            interval_sec: self.interval,
            source: Endpoint::parse(&self.source)?,
            target: Endpoint::parse_optional(&self.target)?,
            namespace: self.namespace.clone(),
            store: StoreSettings {
                scan_count: self.scan_count,
                fetch_batch_size: self.fetch_batch_size,
                connect_timeout: self.connect_timeout.clone(),
            },
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "redis-keysync stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mode = cli.mode();
    let config = cli.sync_config()?;
    config.check_mode(mode)?;

    let retry = RetryConfig::startup(config.store.connect_timeout_duration());
    let source = RedisStore::connect(config.source.clone(), config.store.clone(), &retry).await?;
    let target = match config.target.clone() {
        Some(endpoint) => Some(RedisStore::connect(endpoint, config.store.clone(), &retry).await?),
        None => None,
    };

    let summary = Runner::new(config, source, target).run(mode).await?;
    info!(cycles = summary.cycles, failed_cycles = summary.failed_cycles, "Done");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over `LOG_LEVEL`.
fn init_logging(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| normalize_level(level).into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Accept Python-style level names (`INFO`, `WARNING`, `CRITICAL`).
fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}
