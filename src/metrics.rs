//! Metrics for observability.
//!
//! Emits through the `metrics` facade; the embedding process installs an
//! exporter if it wants one. Without an exporter every call is a no-op.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `keysync_`:
//! - Counters end in `_total`
//! - Histograms track durations in seconds

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a store connection attempt.
pub fn record_store_connection(store: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("keysync_store_connections_total", "store" => store.to_string(), "status" => status)
        .increment(1);
}

/// Record the number of keys a scan returned.
pub fn record_keys_scanned(store: &str, count: usize) {
    gauge!("keysync_keys_scanned", "store" => store.to_string()).set(count as f64);
}

/// Record store operation latency (SCAN, GET/TTL, write batch).
pub fn record_store_operation_latency(store: &str, operation: &str, duration: Duration) {
    histogram!(
        "keysync_store_operation_duration_seconds",
        "store" => store.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record keys found on the source but not on the target.
pub fn record_missing_keys(count: usize) {
    gauge!("keysync_missing_keys").set(count as f64);
}

/// Record a replicate step.
pub fn record_replication(fetched: usize, vanished: usize, written: usize) {
    counter!("keysync_keys_fetched_total").increment(fetched as u64);
    counter!("keysync_keys_replicated_total").increment(written as u64);
    if vanished > 0 {
        counter!("keysync_keys_vanished_total").increment(vanished as u64);
    }
}

/// Record a write batch.
pub fn record_write_batch(store: &str, commands: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("keysync_write_batches_total", "store" => store.to_string(), "status" => status)
        .increment(1);
    histogram!("keysync_write_batch_commands", "store" => store.to_string())
        .record(commands as f64);
}

/// Record a completed or failed cycle.
pub fn record_cycle(mode: &str, outcome: &str, duration: Duration) {
    counter!(
        "keysync_cycles_total",
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("keysync_cycle_duration_seconds", "mode" => mode.to_string())
        .record(duration.as_secs_f64());
}

/// Record errors by kind.
pub fn record_error(kind: &str) {
    counter!("keysync_errors_total", "kind" => kind.to_string()).increment(1);
}
