//! In-process key store.
//!
//! Behaves like a single Redis database for the three [`KeyStore`] operations
//! and records every write batch, so tests can assert exactly which commands
//! a sync cycle issued. TTLs are stored but never count down.
//!
//! Fault injection:
//! - [`fail_next_scans`](MemoryStore::fail_next_scans): SCAN fails as if the store was unreachable
//! - [`fail_writes`](MemoryStore::fail_writes): every write batch fails
//! - [`vanish_after_scan`](MemoryStore::vanish_after_scan): key is listed, then deleted before fetch

use super::{display_key, plan_writes, BoxFuture, Key, KeyRecord, KeySet, KeyStore, WriteOp};
use crate::error::KeySyncError;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    ttl_secs: Option<u64>,
}

/// In-memory [`KeyStore`] with call recording.
pub struct MemoryStore {
    name: String,
    entries: RwLock<HashMap<Key, Entry>>,
    /// Every batch passed to write_records, as planned commands
    batches: RwLock<Vec<Vec<WriteOp>>>,
    /// Keys deleted right after the next scan lists them
    vanishing: RwLock<HashSet<Key>>,
    scan_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    failing_scans: AtomicUsize,
    failing_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            batches: RwLock::new(Vec::new()),
            vanishing: RwLock::new(HashSet::new()),
            scan_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            failing_scans: AtomicUsize::new(0),
            failing_writes: AtomicBool::new(false),
        }
    }

    /// Set a key. `ttl <= 0` stores it without expiry.
    pub async fn insert(&self, key: impl AsRef<[u8]>, value: impl Into<Vec<u8>>, ttl: i64) {
        let record = KeyRecord::new(key.as_ref(), value, ttl);
        self.entries.write().await.insert(
            record.name,
            Entry {
                value: record.value,
                ttl_secs: record.ttl_secs,
            },
        );
    }

    pub async fn get(&self, key: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.entries.read().await.get(key.as_ref()).map(|e| e.value.clone())
    }

    /// Remaining TTL in Redis terms: seconds, `-1` for no expiry, `-2` if missing.
    pub async fn ttl(&self, key: impl AsRef<[u8]>) -> i64 {
        match self.entries.read().await.get(key.as_ref()) {
            Some(Entry { ttl_secs: Some(t), .. }) => *t as i64,
            Some(_) => -1,
            None => -2,
        }
    }

    pub async fn keys(&self) -> KeySet {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Write batches received so far.
    pub async fn write_batches(&self) -> Vec<Vec<WriteOp>> {
        self.batches.read().await.clone()
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `n` scans with `StoreUnavailable`.
    pub fn fail_next_scans(&self, n: usize) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    /// Make every write batch fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.failing_writes.store(fail, Ordering::SeqCst);
    }

    /// Delete `key` right after the next scan has listed it.
    pub async fn vanish_after_scan(&self, key: impl AsRef<[u8]>) {
        self.vanishing.write().await.insert(key.as_ref().to_vec());
    }

    async fn scan(&self, pattern: &str) -> crate::Result<KeySet> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .failing_scans
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(KeySyncError::unavailable(&self.name, "SCAN", "injected failure"));
        }

        let mut entries = self.entries.write().await;
        let keys: KeySet = entries
            .keys()
            .filter(|k| glob_match(pattern.as_bytes(), k.as_slice()))
            .cloned()
            .collect();

        for key in self.vanishing.write().await.drain() {
            if entries.remove(&key).is_some() {
                debug!(store = %self.name, key = %display_key(&key), "Key vanished after scan");
            }
        }
        Ok(keys)
    }

    async fn fetch(&self, keys: &KeySet) -> crate::Result<Vec<KeyRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| {
                entries.get(k).map(|e| KeyRecord {
                    name: k.clone(),
                    value: e.value.clone(),
                    ttl_secs: e.ttl_secs,
                })
            })
            .collect())
    }

    async fn write(&self, records: Vec<KeyRecord>) -> crate::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let ops = plan_writes(records);
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(KeySyncError::batch(&self.name, ops.len(), "injected failure", None));
        }

        let mut entries = self.entries.write().await;
        for op in &ops {
            match op {
                WriteOp::Set { key, value } => {
                    // SET clears any previous expiry
                    entries.insert(
                        key.clone(),
                        Entry {
                            value: value.clone(),
                            ttl_secs: None,
                        },
                    );
                }
                WriteOp::Expire { key, seconds } => {
                    if let Some(entry) = entries.get_mut(key) {
                        entry.ttl_secs = Some(*seconds);
                    }
                }
            }
        }
        self.batches.write().await.push(ops);
        Ok(())
    }
}

impl KeyStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_keys<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, KeySet> {
        Box::pin(self.scan(pattern))
    }

    fn fetch_details<'a>(&'a self, keys: &'a KeySet) -> BoxFuture<'a, Vec<KeyRecord>> {
        Box::pin(self.fetch(keys))
    }

    fn write_records(&self, records: Vec<KeyRecord>) -> BoxFuture<'_, ()> {
        Box::pin(self.write(records))
    }
}

/// Glob matcher supporting `*` and `?`, as used by SCAN MATCH.
///
/// Works on bytes like Redis does: `?` matches exactly one byte.
fn glob_match(pat: &[u8], inp: &[u8]) -> bool {
    let (plen, ilen) = (pat.len(), inp.len());

    let mut dp = vec![vec![false; ilen + 1]; plen + 1];
    dp[0][0] = true;

    for i in 1..=plen {
        if pat[i - 1] == b'*' {
            dp[i][0] = dp[i - 1][0];
        }
    }

    for i in 1..=plen {
        for j in 1..=ilen {
            if pat[i - 1] == b'*' {
                dp[i][j] = dp[i - 1][j] || dp[i][j - 1];
            } else if pat[i - 1] == b'?' || pat[i - 1] == inp[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            }
        }
    }

    dp[plen][ilen]
}
