//! Redis-backed cache store adapter.
//!
//! Category blobs are plain values, leases are `SET NX PX` keys, and the
//! realtime ranking is a ZSET. The decay multiply runs as a Lua script so
//! one cycle rescales the whole set atomically. Every round trip is
//! bounded by the configured operation timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use crate::cache::{CacheStore, CacheStoreError};
use crate::config::RedisSettings;

use super::error::InfraError;

const DECAY_SCRIPT: &str = r#"
local members = redis.call('ZRANGE', KEYS[1], 0, -1, 'WITHSCORES')
for i = 1, #members, 2 do
    redis.call('ZADD', KEYS[1], tonumber(members[i + 1]) * tonumber(ARGV[1]), members[i])
end
return #members / 2
"#;

pub struct RedisCacheStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    decay_script: Script,
}

impl RedisCacheStore {
    /// Connect to the cache store named in `settings`.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, InfraError> {
        let client = redis::Client::open(settings.url.as_str())
            .map_err(|err| InfraError::connection(err.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::connection(err.to_string()))?;
        Ok(Self {
            conn,
            op_timeout: settings.op_timeout(),
            decay_script: Script::new(DECAY_SCRIPT),
        })
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, CacheStoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CacheStoreError::unavailable(err)),
            Err(_) => Err(CacheStoreError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set_blob(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_vec();
        match ttl {
            Some(ttl) => {
                let ttl_ms = ttl.as_millis() as u64;
                self.bounded(async move {
                    redis::cmd("SET")
                        .arg(&key)
                        .arg(&value)
                        .arg("PX")
                        .arg(ttl_ms)
                        .query_async::<()>(&mut conn)
                        .await
                })
                .await
            }
            None => self.bounded(async move { conn.set(key, value).await }).await,
        }
    }

    async fn delete_blob(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        self.bounded(async move { conn.del(key).await }).await
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let ttl_ms = ttl.as_millis() as u64;
        let reply = self
            .bounded(async move {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(1)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async::<Option<String>>(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn release_lease(&self, key: &str) -> Result<(), CacheStoreError> {
        self.delete_blob(key).await
    }

    async fn zincr(&self, key: &str, member: Uuid, delta: f64) -> Result<f64, CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let member = member.to_string();
        self.bounded(async move { conn.zincr(key, member, delta).await })
            .await
    }

    async fn zrange_desc(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>, CacheStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let stop = limit as isize - 1;
        let members: Vec<(String, f64)> = self
            .bounded(async move { conn.zrevrange_withscores(key, 0, stop).await })
            .await?;
        // Members that do not parse as ids are skipped rather than failing
        // the whole range.
        Ok(members
            .into_iter()
            .filter_map(|(member, score)| member.parse::<Uuid>().ok().map(|id| (id, score)))
            .collect())
    }

    async fn zscale(&self, key: &str, factor: f64) -> Result<(), CacheStoreError> {
        let script = &self.decay_script;
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let _scaled: i64 = self
            .bounded(async move { script.key(key).arg(factor).invoke_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn zrem_below(&self, key: &str, floor: f64) -> Result<u64, CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        self.bounded(async move { conn.zrembyscore(key, "-inf", floor).await })
            .await
    }

    async fn zrem(&self, key: &str, member: Uuid) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let member = member.to_string();
        self.bounded(async move { conn.zrem(key, member).await }).await
    }
}
