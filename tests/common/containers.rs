// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for Redis.
//!
//! Provides helpers to spin up Redis containers for integration tests.

use redis::AsyncCommands;
use redis_keysync::{Endpoint, RedisStore, RetryConfig, StoreSettings};
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

/// Create a vanilla Redis container.
///
/// Uses official redis:7 image. Waits for "Ready to accept connections".
pub fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// A Redis instance running in a container, addressed by `host:port`.
pub struct TestRedis<'a> {
    #[allow(dead_code)] // Kept alive for container lifetime
    container: Container<'a, GenericImage>,
    pub endpoint: Endpoint,
}

impl<'a> TestRedis<'a> {
    pub fn new(docker: &'a Cli) -> Self {
        let container = redis_container(docker);
        let port = container.get_host_port_ipv4(6379);
        let endpoint = Endpoint::parse(&format!("127.0.0.1:{}", port))
            .expect("container endpoint should parse");
        Self { container, endpoint }
    }

    /// Connect a `RedisStore` to this instance with small batch sizes,
    /// so multi-step scans and chunked fetches are exercised.
    pub async fn store(&self) -> RedisStore {
        let settings = StoreSettings {
            scan_count: 2,
            fetch_batch_size: 2,
            ..StoreSettings::default()
        };
        RedisStore::connect(self.endpoint.clone(), settings, &RetryConfig::testing())
            .await
            .expect("Failed to connect to test Redis")
    }

    async fn conn(&self) -> redis::aio::MultiplexedConnection {
        let client = redis::Client::open(self.endpoint.redis_url()).unwrap();
        client.get_multiplexed_async_connection().await.unwrap()
    }

    /// SET `key`, with an expiry when `ttl` is positive.
    pub async fn seed(&self, key: impl AsRef<[u8]>, value: &str, ttl: u64) {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key.as_ref()).arg(value);
        if ttl > 0 {
            cmd.arg("EX").arg(ttl);
        }
        cmd.query_async::<_, ()>(&mut self.conn().await).await.unwrap();
    }

    pub async fn get(&self, key: impl AsRef<[u8]>) -> Option<String> {
        self.conn().await.get(key.as_ref()).await.unwrap()
    }

    pub async fn ttl(&self, key: impl AsRef<[u8]>) -> i64 {
        self.conn().await.ttl(key.as_ref()).await.unwrap()
    }

    pub async fn dbsize(&self) -> usize {
        redis::cmd("DBSIZE")
            .query_async(&mut self.conn().await)
            .await
            .unwrap()
    }

    /// Store a non-string value under `key`.
    pub async fn seed_list(&self, key: &str, items: &[&str]) {
        self.conn().await.rpush::<_, _, ()>(key, items).await.unwrap();
    }
}
