use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::time::timeout;

use super::{KeyType, KvStore};
use crate::error::StoreError;

/// [`KvStore`] backed by a Redis server.
///
/// Each command is bounded by `call_timeout` and fails straight through on
/// error or timeout; callers decide whether to retry.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    call_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, call_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = timeout(call_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::Timeout(call_timeout.as_millis() as u64))??;
        tracing::info!("Connected to redis key-value backend");
        Ok(Self { conn, call_timeout })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.call_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    /// Liveness probe used by the readiness endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}

/// Escapes glob metacharacters so a literal prefix can be used in `MATCH`.
pub(crate) fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.set(key, value).await }).await
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.hgetall(key).await }).await
    }

    async fn set_hash(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.hset_multiple(key, fields).await })
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.exists(key).await }).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: usize = self.bounded(async move { conn.del(key).await }).await?;
        Ok(removed > 0)
    }

    async fn list_append(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.rpush(key, value).await }).await
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.lrange(key, start, stop).await })
            .await
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut conn = self.conn.clone();
        let pattern = glob_prefix(prefix);
        self.bounded(async move {
            redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(count)
                .query_async::<_, (u64, Vec<String>)>(&mut conn)
                .await
        })
        .await
    }

    async fn key_type(&self, key: &str) -> Result<KeyType, StoreError> {
        let mut conn = self.conn.clone();
        let name: String = self
            .bounded(async move { redis::cmd("TYPE").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(KeyType::from_redis(&name))
    }
}
