//! Configuration for key synchronization.
//!
//! A [`SyncConfig`] is built once at startup (by the CLI from flags and
//! environment variables, or programmatically) and handed by value to the
//! [`Runner`](crate::runner::Runner). It is never mutated afterwards.
//!
//! # Quick Start
//!
//! ```rust
//! use redis_keysync::config::SyncConfig;
//!
//! let config = SyncConfig::from_endpoints("10.0.0.1:6379", "10.0.0.2:6379")
//!     .unwrap()
//!     .with_namespace("session:*");
//! assert_eq!(config.namespace, "session:*");
//! assert!(config.dry_run);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! SyncConfig
//! ├── dry_run: bool                # Detect only, never write
//! ├── interval_sec: i64            # <= 0 runs a single cycle
//! ├── source: Endpoint             # Store to copy from
//! ├── target: Option<Endpoint>     # Store to copy to ("none" = unset)
//! ├── namespace: String            # SCAN MATCH pattern
//! └── store: StoreSettings
//!     ├── scan_count: usize        # SCAN COUNT hint
//!     ├── fetch_batch_size: usize  # Keys per GET/TTL pipeline
//!     └── connect_timeout: String  # Per-attempt connect timeout ("5s")
//! ```

use crate::endpoint::Endpoint;
use crate::error::{KeySyncError, Result};
use crate::runner::Mode;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Everything a runner needs, loaded once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// When true, sync mode only reports missing keys.
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Seconds between cycles. Zero or negative runs exactly one cycle.
    #[serde(default = "default_interval_sec")]
    pub interval_sec: i64,

    /// Store keys are copied from.
    #[serde(default = "Endpoint::localhost")]
    pub source: Endpoint,

    /// Store keys are copied to. `None` disables replication.
    ///
    /// Accepts `null` or the `"none"` sentinel, same as the CLI.
    #[serde(default, deserialize_with = "deserialize_target")]
    pub target: Option<Endpoint>,

    /// Glob pattern scoping the scan on both stores.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Redis client tuning.
    #[serde(default)]
    pub store: StoreSettings,
}

fn default_true() -> bool {
    true
}

fn default_interval_sec() -> i64 {
    30
}

fn default_namespace() -> String {
    "*".to_string()
}

fn deserialize_target<'de, D>(deserializer: D) -> std::result::Result<Option<Endpoint>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => Endpoint::parse_optional(&raw).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            interval_sec: 30,
            source: Endpoint::localhost(),
            target: None,
            namespace: "*".to_string(),
            store: StoreSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Build a config from raw endpoint strings (target may be `none`).
    pub fn from_endpoints(source: &str, target: &str) -> Result<Self> {
        Ok(Self {
            source: Endpoint::parse(source)?,
            target: Endpoint::parse_optional(target)?,
            ..Default::default()
        })
    }

    /// Single-shot, non-dry-run config for tests.
    pub fn for_testing() -> Self {
        Self {
            dry_run: false,
            interval_sec: 0,
            target: Some(Endpoint::localhost()),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_interval_sec(mut self, interval_sec: i64) -> Self {
        self.interval_sec = interval_sec;
        self
    }

    /// Sleep between cycles, or `None` for a single cycle.
    pub fn interval(&self) -> Option<Duration> {
        if self.interval_sec > 0 {
            Some(Duration::from_secs(self.interval_sec as u64))
        } else {
            None
        }
    }

    /// Check that this config can drive `mode`.
    pub fn check_mode(&self, mode: Mode) -> Result<()> {
        if mode == Mode::Sync && self.target.is_none() {
            return Err(KeySyncError::Config(
                "sync mode needs a target endpoint (got \"none\")".to_string(),
            ));
        }
        if self.namespace.is_empty() {
            return Err(KeySyncError::Config("namespace pattern is empty".to_string()));
        }
        self.store.validate()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StoreSettings: redis client tuning
// ═══════════════════════════════════════════════════════════════════════════════

/// Redis client settings shared by source and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// `COUNT` hint for each SCAN call.
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,

    /// Keys per GET/TTL pipeline during detail fetch.
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Connect timeout per attempt as a duration string (e.g., "5s").
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
}

fn default_scan_count() -> usize {
    1000
}

fn default_fetch_batch_size() -> usize {
    500
}

fn default_connect_timeout() -> String {
    "5s".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            scan_count: 1000,
            fetch_batch_size: 500,
            connect_timeout: "5s".to_string(),
        }
    }
}

impl StoreSettings {
    /// Parse the connect timeout, falling back to 5 seconds.
    pub fn connect_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.connect_timeout).unwrap_or(Duration::from_secs(5))
    }

    fn validate(&self) -> Result<()> {
        if self.scan_count == 0 {
            return Err(KeySyncError::Config("scan_count must be positive".to_string()));
        }
        if self.fetch_batch_size == 0 {
            return Err(KeySyncError::Config(
                "fetch_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse an on/off switch such as `DRY_RUN=yes`.
pub fn parse_switch(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "on" => Ok(true),
        "no" | "n" | "false" | "0" | "off" => Ok(false),
        other => Err(KeySyncError::Config(format!(
            "expected yes/no, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert!(config.dry_run);
        assert_eq!(config.interval_sec, 30);
        assert_eq!(config.source.to_string(), "localhost:6379");
        assert!(config.target.is_none());
        assert_eq!(config.namespace, "*");
    }

    #[test]
    fn test_from_endpoints() {
        let config = SyncConfig::from_endpoints("src.local:6379", "none").unwrap();
        assert_eq!(config.source.host(), "src.local");
        assert!(config.target.is_none());

        let config = SyncConfig::from_endpoints("10.0.0.1:6379", "10.0.0.2:6380").unwrap();
        assert_eq!(config.target.unwrap().port(), 6380);
    }

    #[test]
    fn test_from_endpoints_rejects_invalid() {
        assert!(matches!(
            SyncConfig::from_endpoints("256.1.1.1:6379", "none"),
            Err(KeySyncError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            SyncConfig::from_endpoints("localhost:6379", "target"),
            Err(KeySyncError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_interval() {
        let config = SyncConfig::default().with_interval_sec(45);
        assert_eq!(config.interval(), Some(Duration::from_secs(45)));
        assert_eq!(config.with_interval_sec(0).interval(), None);
        assert_eq!(SyncConfig::default().with_interval_sec(-5).interval(), None);
    }

    #[test]
    fn test_check_mode() {
        let monitor_only = SyncConfig::default();
        assert!(monitor_only.check_mode(Mode::Monitor).is_ok());
        assert!(matches!(
            monitor_only.check_mode(Mode::Sync),
            Err(KeySyncError::Config(_))
        ));
        assert!(SyncConfig::for_testing().check_mode(Mode::Sync).is_ok());
        assert!(SyncConfig::for_testing()
            .with_namespace("")
            .check_mode(Mode::Monitor)
            .is_err());
    }

    #[test]
    fn test_check_mode_rejects_zero_batch() {
        let mut config = SyncConfig::for_testing();
        config.store.fetch_batch_size = 0;
        assert!(config.check_mode(Mode::Sync).is_err());
    }

    #[test]
    fn test_parse_switch() {
        for raw in ["yes", "YES", "true", "1", "on", " y "] {
            assert!(parse_switch(raw).unwrap(), "{}", raw);
        }
        for raw in ["no", "false", "0", "off", "N"] {
            assert!(!parse_switch(raw).unwrap(), "{}", raw);
        }
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_connect_timeout_parsing() {
        let test_cases = [
            ("5s", Duration::from_secs(5)),
            ("500ms", Duration::from_millis(500)),
            ("1m", Duration::from_secs(60)),
        ];
        for (input, expected) in test_cases {
            let settings = StoreSettings {
                connect_timeout: input.to_string(),
                ..Default::default()
            };
            assert_eq!(settings.connect_timeout_duration(), expected, "{}", input);
        }
    }

    #[test]
    fn test_connect_timeout_invalid_fallback() {
        let settings = StoreSettings {
            connect_timeout: "soon".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.connect_timeout_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = SyncConfig::from_endpoints("a.example.com:6379", "10.0.0.2:6380")
            .unwrap()
            .with_namespace("user:*")
            .with_dry_run(false);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"a.example.com:6379\""));
        let parsed: SyncConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.source, config.source);
        assert_eq!(parsed.target, config.target);
        assert_eq!(parsed.namespace, "user:*");
        assert!(!parsed.dry_run);
    }

    #[test]
    fn test_config_json_defaults() {
        let parsed: SyncConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.dry_run);
        assert_eq!(parsed.interval_sec, 30);
        assert_eq!(parsed.store.scan_count, 1000);
        assert_eq!(parsed.store.fetch_batch_size, 500);
    }

    #[test]
    fn test_config_json_target_sentinel() {
        let parsed: SyncConfig = serde_json::from_str(r#"{"target": "none"}"#).unwrap();
        assert!(parsed.target.is_none());

        let parsed: SyncConfig = serde_json::from_str(r#"{"target": "NONE"}"#).unwrap();
        assert!(parsed.target.is_none());

        let parsed: SyncConfig = serde_json::from_str(r#"{"target": null}"#).unwrap();
        assert!(parsed.target.is_none());

        let parsed: SyncConfig = serde_json::from_str(r#"{"target": "replica:6380"}"#).unwrap();
        assert_eq!(parsed.target.map(|t| t.port()), Some(6380));

        let result: std::result::Result<SyncConfig, _> =
            serde_json::from_str(r#"{"target": "replica"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_json_rejects_bad_endpoint() {
        let result: std::result::Result<SyncConfig, _> =
            serde_json::from_str(r#"{"source": "host:99999"}"#);
        assert!(result.is_err());
    }
}
