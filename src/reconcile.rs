// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key reconciliation between a source and a target store.
//!
//! # Algorithm
//!
//! 1. Scan the source for keys matching the namespace
//! 2. Scan the target for the same pattern
//! 3. Missing keys = source \ target (presence only, values are not compared)
//! 4. Fetch value + TTL of the missing keys from the source
//! 5. Write them to the target in one batch
//!
//! A key that disappears from the source between steps 1 and 4 is dropped
//! from the batch; it is counted as vanished, not reported as an error.

use crate::error::Result;
use crate::metrics;
use crate::store::{display_keys, KeySet, KeyStore};
use tracing::{debug, info, instrument};

/// Statistics from a replicate step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplicateStats {
    /// Keys found missing on the target
    pub requested: usize,
    /// Records read from the source
    pub fetched: usize,
    /// Keys gone from the source by fetch time
    pub vanished: usize,
    /// Records written to the target
    pub written: usize,
}

/// Keys present on `source` but not on `target` under `namespace`.
#[instrument(skip_all, fields(namespace = %namespace, source_store = source.name(), target_store = target.name()))]
pub async fn compare<S, T>(namespace: &str, source: &S, target: &T) -> Result<KeySet>
where
    S: KeyStore + ?Sized,
    T: KeyStore + ?Sized,
{
    let source_keys = source.list_keys(namespace).await?;
    metrics::record_keys_scanned(source.name(), source_keys.len());

    let target_keys = target.list_keys(namespace).await?;
    metrics::record_keys_scanned(target.name(), target_keys.len());

    let missing: KeySet = source_keys.difference(&target_keys).cloned().collect();
    metrics::record_missing_keys(missing.len());

    if missing.is_empty() {
        debug!(source_keys = source_keys.len(), "No new keys found on source");
    } else {
        debug!(
            source_keys = source_keys.len(),
            target_keys = target_keys.len(),
            missing = ?display_keys(&missing),
            "New keys found on source"
        );
    }

    Ok(missing)
}

/// Copy `missing` keys with their values and TTLs from `source` to `target`.
#[instrument(skip_all, fields(source_store = source.name(), target_store = target.name(), missing = missing.len()))]
pub async fn replicate<S, T>(source: &S, target: &T, missing: &KeySet) -> Result<ReplicateStats>
where
    S: KeyStore + ?Sized,
    T: KeyStore + ?Sized,
{
    if missing.is_empty() {
        info!("All keys already present on target");
        return Ok(ReplicateStats::default());
    }

    info!("New keys to add on target");
    let records = source.fetch_details(missing).await?;

    let stats = ReplicateStats {
        requested: missing.len(),
        fetched: records.len(),
        vanished: missing.len().saturating_sub(records.len()),
        written: records.len(),
    };

    target.write_records(records).await?;
    metrics::record_replication(stats.fetched, stats.vanished, stats.written);

    info!(
        written = stats.written,
        vanished = stats.vanished,
        "Replicated keys to target"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyRecord, MemoryStore, WriteOp};

    fn keys(names: &[&str]) -> KeySet {
        names.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    async fn store_with(name: &str, entries: &[(&str, &str, i64)]) -> MemoryStore {
        let store = MemoryStore::new(name);
        for (k, v, ttl) in entries {
            store.insert(k, *v, *ttl).await;
        }
        store
    }

    #[tokio::test]
    async fn test_compare_returns_difference() {
        let source = store_with("src", &[("a", "1", 0), ("b", "2", 0), ("c", "3", 0)]).await;
        let target = store_with("dst", &[("a", "1", 0), ("z", "9", 0)]).await;

        let missing = compare("*", &source, &target).await.unwrap();
        assert_eq!(missing, keys(&["b", "c"]));
    }

    #[tokio::test]
    async fn test_compare_identical_is_empty() {
        let source = store_with("src", &[("a", "1", 0), ("b", "2", 0)]).await;
        let target = store_with("dst", &[("a", "other", 0), ("b", "values", 0)]).await;

        // Values differ but presence matches: nothing to do
        assert!(compare("*", &source, &target).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compare_respects_namespace() {
        let source = store_with("src", &[("user:1", "a", 0), ("order:1", "b", 0)]).await;
        let target = MemoryStore::new("dst");

        let missing = compare("user:*", &source, &target).await.unwrap();
        assert_eq!(missing, keys(&["user:1"]));
    }

    #[tokio::test]
    async fn test_compare_propagates_scan_failure() {
        let source = store_with("src", &[("a", "1", 0)]).await;
        let target = MemoryStore::new("dst");
        target.fail_next_scans(1);

        let err = compare("*", &source, &target).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_replicate_empty_does_nothing() {
        let source = store_with("src", &[("a", "1", 0)]).await;
        let target = MemoryStore::new("dst");

        let stats = replicate(&source, &target, &KeySet::new()).await.unwrap();
        assert_eq!(stats, ReplicateStats::default());
        assert_eq!(source.fetch_calls(), 0);
        assert!(target.write_batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_replicate_copies_values_and_ttl() {
        let source = store_with("src", &[("a", "1", 0), ("b", "2", 120), ("c", "3", -1)]).await;
        let target = store_with("dst", &[("a", "1", 0)]).await;

        let stats = replicate(&source, &target, &keys(&["b", "c"])).await.unwrap();
        assert_eq!(stats.requested, 2);
        assert_eq!(stats.written, 2);
        assert_eq!(stats.vanished, 0);

        assert_eq!(target.get("b").await, Some(b"2".to_vec()));
        assert_eq!(target.ttl("b").await, 120);
        assert_eq!(target.get("c").await, Some(b"3".to_vec()));
        assert_eq!(target.ttl("c").await, -1);

        let batches = target.write_batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![
                WriteOp::Set { key: "b".into(), value: b"2".to_vec() },
                WriteOp::Expire { key: "b".into(), seconds: 120 },
                WriteOp::Set { key: "c".into(), value: b"3".to_vec() },
            ]
        );
    }

    #[tokio::test]
    async fn test_replicate_skips_vanished_keys() {
        let source = store_with("src", &[("a", "1", 0)]).await;
        let target = MemoryStore::new("dst");

        // "b" was scanned but is gone by fetch time
        let stats = replicate(&source, &target, &keys(&["a", "b"])).await.unwrap();
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.vanished, 1);
        assert_eq!(target.keys().await, keys(&["a"]));
    }

    #[tokio::test]
    async fn test_binary_keys_replicate() {
        let key = vec![b'k', 0xff, 0xfe];
        let source = MemoryStore::new("src");
        source.insert(&key, "bin", 45).await;
        let target = MemoryStore::new("dst");

        let missing = compare("k*", &source, &target).await.unwrap();
        assert_eq!(missing, KeySet::from([key.clone()]));

        let stats = replicate(&source, &target, &missing).await.unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(target.get(&key).await, Some(b"bin".to_vec()));
        assert_eq!(target.ttl(&key).await, 45);
    }

    #[tokio::test]
    async fn test_replicate_all_vanished_writes_nothing() {
        let source = MemoryStore::new("src");
        let target = MemoryStore::new("dst");

        let stats = replicate(&source, &target, &keys(&["gone"])).await.unwrap();
        assert_eq!(stats.written, 0);
        assert!(target.write_batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_replicate_surfaces_batch_failure() {
        let source = store_with("src", &[("a", "1", 5)]).await;
        let target = MemoryStore::new("dst");
        target.fail_writes(true);

        let err = replicate(&source, &target, &keys(&["a"])).await.unwrap_err();
        assert_eq!(err.kind(), "partial_batch_failure");
        assert!(target.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_record_roundtrip_through_stores() {
        let source = store_with("src", &[("k", "v", 42)]).await;
        let records = source.fetch_details(&keys(&["k"])).await.unwrap();
        assert_eq!(records, vec![KeyRecord::new("k", "v", 42)]);
    }
}
