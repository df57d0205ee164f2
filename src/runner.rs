// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync / monitor loop.
//!
//! One cycle runs to completion (scan source, scan target, diff, optional
//! fetch + write) before the process sleeps for `interval_sec` and starts the
//! next. There is no overlap between cycles and no internal stop condition:
//! a watch-mode run ends only when the process is terminated.
//!
//! # Modes
//!
//! - **Sync**: copy keys missing on the target (or only report them in dry run)
//! - **Monitor**: report source keys, and target keys when a target is set; never writes
//!
//! # Failure Policy
//!
//! With an interval configured, a cycle that fails with a retryable error
//! (store unreachable, command rejected, batch failed) is logged and skipped;
//! the next tick retries on the reconnecting connection manager. Any other
//! error ends the run. A single-shot run returns whatever error its cycle hit.

use crate::config::SyncConfig;
use crate::error::{KeySyncError, Result};
use crate::metrics;
use crate::reconcile::{self, ReplicateStats};
use crate::store::{display_keys, KeySet, KeyStore};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Operating mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Monitor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one cycle observed and did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Keys on the source (monitor mode)
    pub source_keys: Option<KeySet>,
    /// Keys on the target (monitor mode with a target)
    pub target_keys: Option<KeySet>,
    /// Keys on the source but not the target (sync mode)
    pub missing: KeySet,
    /// Set when the cycle wrote to the target
    pub replicated: Option<ReplicateStats>,
}

/// Totals for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
}

/// Drives cycles against one source and an optional target.
pub struct Runner<S, T> {
    config: SyncConfig,
    source: S,
    target: Option<T>,
}

impl<S: KeyStore, T: KeyStore> Runner<S, T> {
    pub fn new(config: SyncConfig, source: S, target: Option<T>) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    /// Run cycles until terminated, or once when no interval is set.
    pub async fn run(&self, mode: Mode) -> Result<RunSummary> {
        self.config.check_mode(mode)?;
        if mode == Mode::Sync && self.target.is_none() {
            return Err(KeySyncError::Config(
                "sync mode needs a target store".to_string(),
            ));
        }

        let mut summary = RunSummary::default();
        let Some(interval) = self.config.interval() else {
            info!(mode = %mode, "Running a single cycle");
            summary.cycles = 1;
            self.run_cycle(mode).await?;
            return Ok(summary);
        };

        info!(
            mode = %mode,
            interval_secs = interval.as_secs(),
            dry_run = self.config.dry_run,
            namespace = %self.config.namespace,
            "Starting watch loop"
        );

        loop {
            summary.cycles += 1;
            match self.run_cycle(mode).await {
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    summary.failed_cycles += 1;
                    warn!(
                        mode = %mode,
                        cycle = summary.cycles,
                        error = %e,
                        "Cycle failed, retrying on next tick"
                    );
                }
                Err(e) => return Err(e),
            }

            debug!(sleep_secs = interval.as_secs(), "Sleeping until next cycle");
            tokio::time::sleep(interval).await;
        }
    }

    /// Run one cycle in `mode`.
    pub async fn run_cycle(&self, mode: Mode) -> Result<CycleReport> {
        let span = info_span!("cycle", mode = %mode);
        let start = Instant::now();

        let result = async {
            match mode {
                Mode::Sync => self.sync_cycle().await,
                Mode::Monitor => self.monitor_cycle().await,
            }
        }
        .instrument(span)
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::record_cycle(mode.as_str(), outcome, start.elapsed());
        if let Err(e) = &result {
            metrics::record_error(e.kind());
        }
        result
    }

    async fn sync_cycle(&self) -> Result<CycleReport> {
        let target = self.target.as_ref().ok_or_else(|| {
            KeySyncError::Config("sync mode needs a target store".to_string())
        })?;

        let missing = reconcile::compare(&self.config.namespace, &self.source, target).await?;
        let mut report = CycleReport::default();

        if self.config.dry_run {
            if missing.is_empty() {
                info!(store = target.name(), "Dry run: every key already exists on target");
            } else {
                info!(
                    store = target.name(),
                    count = missing.len(),
                    missing = ?display_keys(&missing),
                    "Dry run: keys missing on target, not copying"
                );
            }
        } else {
            report.replicated = Some(reconcile::replicate(&self.source, target, &missing).await?);
        }

        report.missing = missing;
        Ok(report)
    }

    async fn monitor_cycle(&self) -> Result<CycleReport> {
        let namespace = &self.config.namespace;
        let mut report = CycleReport::default();

        let source_keys = self.source.list_keys(namespace).await?;
        metrics::record_keys_scanned(self.source.name(), source_keys.len());
        info!(
            store = self.source.name(),
            count = source_keys.len(),
            keys = ?display_keys(&source_keys),
            "Keys for source"
        );
        report.source_keys = Some(source_keys);

        if let Some(target) = &self.target {
            let target_keys = target.list_keys(namespace).await?;
            metrics::record_keys_scanned(target.name(), target_keys.len());
            info!(
                store = target.name(),
                count = target_keys.len(),
                keys = ?display_keys(&target_keys),
                "Keys for target"
            );
            report.target_keys = Some(target_keys);
        }

        Ok(report)
    }
}
