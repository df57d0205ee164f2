//! Redis-backed key store.
//!
//! Wraps a `redis::aio::ConnectionManager`, which provides:
//! - Automatic reconnection on connection loss
//! - Cheap cloning (clones share one multiplexed connection)
//!
//! # Commands
//!
//! | Operation | Commands | Round trips |
//! |-----------|----------|-------------|
//! | `list_keys` | `SCAN cursor MATCH pattern COUNT n` | one per cursor step |
//! | `fetch_details` | `GET` + `TTL` per key, pipelined | one per `fetch_batch_size` keys |
//! | `write_records` | `MULTI`, `SET` (+ `EXPIRE`) per key, `EXEC` | one |
//!
//! `KEYS` is never used: on a large shared keyspace it blocks the server.
//!
//! Key names are read and written as raw bytes. A key that is not valid
//! UTF-8 is copied like any other; it is only rendered lossily in logs.

use super::{display_key, plan_writes, BoxFuture, Key, KeyRecord, KeySet, KeyStore, WriteOp};
use crate::config::StoreSettings;
use crate::endpoint::Endpoint;
use crate::error::{KeySyncError, Result};
use crate::metrics;
use crate::resilience::RetryConfig;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Connection to one Redis instance.
pub struct RedisStore {
    endpoint: Endpoint,
    name: String,
    settings: StoreSettings,
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `endpoint`, retrying with exponential backoff.
    pub async fn connect(
        endpoint: Endpoint,
        settings: StoreSettings,
        retry_config: &RetryConfig,
    ) -> Result<Self> {
        let name = endpoint.to_string();
        info!(store = %name, "Connecting to store");

        let client = Client::open(endpoint.redis_url())
            .map_err(|e| KeySyncError::store(&name, "CONNECT", e))?;

        let mut attempt = 0;

        loop {
            attempt += 1;

            // Wrap connection attempt in a timeout to avoid hanging on unreachable hosts
            let conn_result =
                timeout(retry_config.connection_timeout, client.get_connection_manager()).await;

            let failure = match conn_result {
                Ok(Ok(conn)) => {
                    metrics::record_store_connection(&name, true);
                    if attempt > 1 {
                        info!(store = %name, attempt, "Connected to store after retry");
                    } else {
                        info!(store = %name, "Connected to store");
                    }
                    return Ok(Self {
                        endpoint,
                        name,
                        settings,
                        conn,
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "timed out after {}ms",
                    retry_config.connection_timeout.as_millis()
                ),
            };

            metrics::record_store_connection(&name, false);

            if attempt >= retry_config.max_attempts {
                error!(store = %name, attempt, error = %failure, "Failed to connect after max retries");
                return Err(KeySyncError::unavailable(
                    &name,
                    "CONNECT",
                    format!("connection failed after {} attempts: {}", attempt, failure),
                ));
            }

            let delay = retry_config.delay_for_attempt(attempt);
            warn!(
                store = %name,
                attempt,
                delay_ms = delay.as_millis(),
                error = %failure,
                "Connection attempt failed, retrying"
            );

            tokio::time::sleep(delay).await;
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn scan(&self, pattern: &str) -> Result<KeySet> {
        let start = Instant::now();
        let mut conn = self.conn.clone();
        let mut keys = KeySet::new();
        let mut cursor: u64 = 0;
        let mut steps = 0usize;

        loop {
            let reply: redis::Value = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.settings.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| KeySyncError::store(&self.name, "SCAN", e))?;
            let (next, batch) =
                decode_scan_step(&reply).map_err(|e| KeySyncError::store(&self.name, "SCAN", e))?;

            steps += 1;
            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        metrics::record_store_operation_latency(&self.name, "scan", start.elapsed());
        debug!(store = %self.name, pattern, steps, count = keys.len(), "Scan complete");
        Ok(keys)
    }

    async fn fetch(&self, keys: &KeySet) -> Result<Vec<KeyRecord>> {
        let start = Instant::now();
        let mut conn = self.conn.clone();
        let mut records = Vec::with_capacity(keys.len());
        let names: Vec<&Key> = keys.iter().collect();

        for chunk in names.chunks(self.settings.fetch_batch_size.max(1)) {
            let mut pipe = redis::pipe();
            for key in chunk {
                pipe.cmd("GET").arg(key.as_slice()).cmd("TTL").arg(key.as_slice());
            }

            let replies: Vec<redis::Value> = pipe
                .query_async(&mut conn)
                .await
                .map_err(|e| KeySyncError::store(&self.name, "GET/TTL", e))?;

            for (key, reply) in chunk.iter().zip(replies.chunks(2)) {
                let [value, ttl] = reply else {
                    return Err(KeySyncError::StoreCommand {
                        store: self.name.clone(),
                        operation: "GET/TTL".to_string(),
                        message: format!(
                            "expected 2 replies for {}, got {}",
                            display_key(key),
                            reply.len()
                        ),
                        source: None,
                    });
                };
                let value: Option<Vec<u8>> = redis::from_redis_value(value)
                    .map_err(|e| KeySyncError::store(&self.name, "GET", e))?;
                let ttl: i64 = redis::from_redis_value(ttl)
                    .map_err(|e| KeySyncError::store(&self.name, "TTL", e))?;

                match value {
                    // TTL -2: key expired or was deleted after GET
                    Some(value) if ttl != -2 => {
                        records.push(KeyRecord::new(key.as_slice(), value, ttl));
                    }
                    _ => debug!(
                        store = %self.name,
                        key = %display_key(key),
                        "Key vanished before fetch, skipping"
                    ),
                }
            }
        }

        metrics::record_store_operation_latency(&self.name, "fetch", start.elapsed());
        Ok(records)
    }

    async fn write(&self, records: Vec<KeyRecord>) -> Result<()> {
        if records.is_empty() {
            debug!(store = %self.name, "Pipeline empty, nothing to execute");
            return Ok(());
        }

        let ops = plan_writes(records);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                WriteOp::Set { key, value } => {
                    pipe.cmd("SET").arg(key.as_slice()).arg(value.as_slice()).ignore();
                }
                WriteOp::Expire { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key.as_slice()).arg(*seconds).ignore();
                }
            }
        }

        info!(store = %self.name, commands = ops.len(), "Executing write pipeline");
        let start = Instant::now();
        let result: redis::RedisResult<()> = pipe.query_async(&mut self.conn.clone()).await;
        metrics::record_store_operation_latency(&self.name, "write", start.elapsed());
        metrics::record_write_batch(&self.name, ops.len(), result.is_ok());

        result.map_err(|e| {
            let message = e.to_string();
            KeySyncError::batch(&self.name, ops.len(), message, Some(e))
        })
    }
}

/// Split one SCAN reply into the next cursor and the keys it returned.
///
/// Keys stay raw bytes; decoding them as strings would fail the whole
/// step on the first key that is not valid UTF-8.
fn decode_scan_step(reply: &redis::Value) -> redis::RedisResult<(u64, Vec<Key>)> {
    redis::from_redis_value(reply)
}

impl KeyStore for RedisStore {
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
