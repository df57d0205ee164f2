// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key store interface.
//!
//! The reconciler only needs three things from a store: list keys matching a
//! pattern, fetch value + TTL for a set of keys, and write a batch of records.
//! [`KeyStore`] captures exactly that so the sync logic can run against a real
//! Redis ([`RedisStore`]) or an in-process [`MemoryStore`].
//!
//! # Write plan
//!
//! Both implementations turn a record batch into the same [`WriteOp`] plan via
//! [`plan_writes`]: one `Set` per record, followed by an `Expire` only when the
//! record carries a positive TTL.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A key name. Redis keys are binary-safe, so names are raw bytes.
pub type Key = Vec<u8>;

/// Deduplicated set of key names. Ordered only so logs are stable.
pub type KeySet = BTreeSet<Key>;

/// Render a key for logs. Invalid UTF-8 is replaced, never rejected.
pub fn display_key(key: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}

/// Render a key set for logs.
pub fn display_keys(keys: &KeySet) -> Vec<Cow<'_, str>> {
    keys.iter().map(|k| display_key(k)).collect()
}

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A key's value and remaining time-to-live, as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub name: Key,
    pub value: Vec<u8>,
    ttl_secs: Option<u64>,
}

impl KeyRecord {
    /// Create a record from a raw TTL as reported by the store.
    ///
    /// Zero or negative TTLs (Redis uses `-1` for "no expiry") mean the key
    /// persists; only positive values are kept.
    pub fn new(name: impl Into<Key>, value: impl Into<Vec<u8>>, ttl: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ttl_secs: u64::try_from(ttl).ok().filter(|t| *t > 0),
        }
    }

    /// Remaining TTL in seconds, or `None` for a persistent key.
    pub fn ttl_secs(&self) -> Option<u64> {
        self.ttl_secs
    }

    pub fn is_persistent(&self) -> bool {
        self.ttl_secs.is_none()
    }
}

/// One command in a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set { key: Key, value: Vec<u8> },
    Expire { key: Key, seconds: u64 },
}

impl WriteOp {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Expire { key, .. } => key,
        }
    }
}

/// Flatten records into the commands a batch write issues.
pub fn plan_writes(records: Vec<KeyRecord>) -> Vec<WriteOp> {
    let mut ops = Vec::with_capacity(records.len() * 2);
    for record in records {
        let expire = record.ttl_secs.map(|seconds| WriteOp::Expire {
            key: record.name.clone(),
            seconds,
        });
        ops.push(WriteOp::Set {
            key: record.name,
            value: record.value,
        });
        ops.extend(expire);
    }
    ops
}

/// What the reconciler needs from a key-value store.
///
/// Implementations own their connection; callers drive one operation at a time.
pub trait KeyStore: Send + Sync {
    /// Label for logs and metrics (usually the endpoint).
    fn name(&self) -> &str;

    /// All keys matching a glob pattern, gathered incrementally.
    fn list_keys<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, KeySet>;

    /// Value and TTL for each key. Keys that no longer exist are omitted.
    fn fetch_details<'a>(&'a self, keys: &'a KeySet) -> BoxFuture<'a, Vec<KeyRecord>>;

    /// Apply records as a single batch. An empty batch issues nothing.
    fn write_records(&self, records: Vec<KeyRecord>) -> BoxFuture<'_, ()>;
}

impl<S: KeyStore + ?Sized> KeyStore for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_keys<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, KeySet> {
        (**self).list_keys(pattern)
    }

    fn fetch_details<'a>(&'a self, keys: &'a KeySet) -> BoxFuture<'a, Vec<KeyRecord>> {
        (**self).fetch_details(keys)
    }

    fn write_records(&self, records: Vec<KeyRecord>) -> BoxFuture<'_, ()> {
        (**self).write_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ttl_sign() {
        assert_eq!(KeyRecord::new("k", "v", 120).ttl_secs(), Some(120));
        assert_eq!(KeyRecord::new("k", "v", 0).ttl_secs(), None);
        assert_eq!(KeyRecord::new("k", "v", -1).ttl_secs(), None);
        assert!(KeyRecord::new("k", "v", -2).is_persistent());
    }

    #[test]
    fn test_plan_persistent_record_has_no_expire() {
        let ops = plan_writes(vec![KeyRecord::new("a", "1", 0), KeyRecord::new("b", "2", -1)]);
        assert_eq!(
            ops,
            vec![
                WriteOp::Set { key: "a".into(), value: b"1".to_vec() },
                WriteOp::Set { key: "b".into(), value: b"2".to_vec() },
            ]
        );
    }

    #[test]
    fn test_plan_expiring_record_keeps_ttl() {
        let ops = plan_writes(vec![KeyRecord::new("session:1", "x", 300)]);
        assert_eq!(
            ops,
            vec![
                WriteOp::Set { key: "session:1".into(), value: b"x".to_vec() },
                WriteOp::Expire { key: "session:1".into(), seconds: 300 },
            ]
        );
        assert!(ops.iter().all(|op| op.key() == b"session:1"));
    }

    #[test]
    fn test_binary_key_survives_planning() {
        let key = vec![b'k', 0xff, 0x00];
        let ops = plan_writes(vec![KeyRecord::new(key.clone(), "v", 10)]);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.key() == key.as_slice()));
    }

    #[test]
    fn test_display_key_is_lossy() {
        assert_eq!(display_key(b"user:1"), "user:1");
        assert_eq!(display_key(&[b'k', 0xff]), "k\u{FFFD}");
        let keys = KeySet::from([b"a".to_vec(), vec![0xfe]]);
        assert_eq!(display_keys(&keys), vec!["a", "\u{FFFD}"]);
    }

    #[test]
    fn test_plan_empty() {
        assert!(plan_writes(Vec::new()).is_empty());
    }
}
