// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for key synchronization.
//!
//! Errors are categorized by where they occur (startup validation, store
//! communication, batch writes) and carry the store name and operation so
//! a log line is enough to tell which side of the sync failed.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `InvalidEndpoint` | No | Endpoint string is not `host:port` |
//! | `Config` | No | Invalid option or mode needs a target |
//! | `StoreUnavailable` | Yes | Connect failure, I/O error, timeout, dropped connection |
//! | `StoreCommand` | Yes | Store rejected a command (e.g. `WRONGTYPE`) |
//! | `PartialBatchFailure` | Yes | Write batch failed as a whole |
//!
//! # Retry Behavior
//!
//! The watch loop uses [`KeySyncError::is_retryable()`] to decide whether a
//! failed cycle is skipped (and retried on the next tick) or ends the run.
//! A key that disappears between scan and fetch is not an error at all.

use thiserror::Error;

/// Result type alias for key sync operations.
pub type Result<T> = std::result::Result<T, KeySyncError>;

/// Errors that can occur while validating configuration or syncing keys.
#[derive(Error, Debug)]
pub enum KeySyncError {
    /// Endpoint string is not `ipv4:port` or `hostname:port`.
    ///
    /// Fatal at startup. Not retryable - fix the configuration and restart.
    #[error("Invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Invalid or inconsistent configuration.
    ///
    /// Not retryable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store connection or transport failure.
    ///
    /// Occurs when a store cannot be reached or the connection drops mid-cycle.
    /// Retryable: the next cycle runs on a reconnected manager.
    #[error("Store {store} unavailable ({operation}): {message}")]
    StoreUnavailable {
        store: String,
        operation: String,
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    /// The store answered with an error reply.
    ///
    /// Retryable in the sense that the loop keeps going; the same keyspace
    /// will usually fail the same way until an operator intervenes.
    #[error("Store {store} rejected {operation}: {message}")]
    StoreCommand {
        store: String,
        operation: String,
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    /// The write batch reported an error.
    ///
    /// Reported once for the whole batch. Nothing is rolled back; what the
    /// store applied before failing stays applied.
    #[error("Write batch of {commands} commands failed on {store}: {message}")]
    PartialBatchFailure {
        store: String,
        commands: usize,
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },
}

impl KeySyncError {
    /// Classify a redis error raised by `operation` against `store`.
    ///
    /// Transport-level failures become [`StoreUnavailable`](Self::StoreUnavailable),
    /// error replies become [`StoreCommand`](Self::StoreCommand).
    pub fn store(
        store: impl Into<String>,
        operation: impl Into<String>,
        source: redis::RedisError,
    ) -> Self {
        let store = store.into();
        let operation = operation.into();
        let message = source.to_string();
        if is_transport_error(&source) {
            Self::StoreUnavailable {
                store,
                operation,
                message,
                source: Some(source),
            }
        } else {
            Self::StoreCommand {
                store,
                operation,
                message,
                source: Some(source),
            }
        }
    }

    /// Create a store-unavailable error without a redis source.
    pub fn unavailable(
        store: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StoreUnavailable {
            store: store.into(),
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a batch failure error.
    pub fn batch(
        store: impl Into<String>,
        commands: usize,
        message: impl Into<String>,
        source: Option<redis::RedisError>,
    ) -> Self {
        Self::PartialBatchFailure {
            store: store.into(),
            commands,
            message: message.into(),
            source,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidEndpoint { .. } => false,
            Self::Config(_) => false,
            Self::StoreUnavailable { .. } => true,
            Self::StoreCommand { .. } => true,
            Self::PartialBatchFailure { .. } => true,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
            Self::Config(_) => "config",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::StoreCommand { .. } => "store_command",
            Self::PartialBatchFailure { .. } => "partial_batch_failure",
        }
    }
}

fn is_transport_error(e: &redis::RedisError) -> bool {
    e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
}
