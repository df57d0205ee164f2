//! # redis-keysync
//!
//! Periodically copies keys that exist on a source Redis but are missing on a
//! target Redis, carrying values and remaining TTLs across.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                             Runner                                   │
//! │        (sync / monitor, fixed interval or single cycle)              │
//! │                                                                      │
//! │  ┌──────────────┐    ┌───────────────┐    ┌────────────────────────┐ │
//! │  │ source.SCAN  │───►│source \ target│───►│ fetch GET/TTL (source) │ │
//! │  │ target.SCAN  │    │  (compare)    │    │ MULTI SET/EXPIRE EXEC  │ │
//! │  └──────────────┘    └───────────────┘    │ (target, replicate)    │ │
//! │                                           └────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only key *presence* is compared. Keys whose values differ on the two
//! stores are left alone, and deletions on the source are not propagated.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use redis_keysync::{Endpoint, Mode, RedisStore, RetryConfig, Runner, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> redis_keysync::Result<()> {
//!     let config = SyncConfig::from_endpoints("10.0.0.1:6379", "10.0.0.2:6379")?
//!         .with_dry_run(false)
//!         .with_interval_sec(0);
//!
//!     let retry = RetryConfig::startup(config.store.connect_timeout_duration());
//!     let source = RedisStore::connect(config.source.clone(), config.store.clone(), &retry).await?;
//!     let target = match config.target.clone() {
//!         Some(ep) => Some(RedisStore::connect(ep, config.store.clone(), &retry).await?),
//!         None => None,
//!     };
//!
//!     Runner::new(config, source, target).run(Mode::Sync).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod resilience;
pub mod runner;
pub mod store;

// Re-exports for convenience
pub use config::{StoreSettings, SyncConfig};
pub use endpoint::Endpoint;
pub use error::{KeySyncError, Result};
pub use reconcile::{compare, replicate, ReplicateStats};
pub use resilience::RetryConfig;
pub use runner::{CycleReport, Mode, RunSummary, Runner};
pub use store::{Key, KeyRecord, KeySet, KeyStore, MemoryStore, RedisStore, WriteOp};
