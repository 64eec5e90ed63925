use crate::store::Store;
use async_trait::async_trait;
use host_core::{HostError, HostResult, ReconnectPolicy, Reconnectable};
use redis::AsyncCommands;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{sleep, Duration};

/// One retry after this pause if the dispatcher's reconnect policy (§4.8
/// step 4) currently has reconnection enabled.
const RECONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Production backend, grounded in the source crate's own
/// `src/clustering/persistence/redis.rs::RedisLookup`: open a multiplexed
/// async connection per call and let `redis-rs` pool it internally.
pub struct RedisStore {
    client: redis::Client,
    reconnect_enabled: AtomicBool,
}

impl RedisStore {
    pub fn new(url: &str) -> HostResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| HostError::BadRequest(format!("invalid REDIS.URL: {e}")))?;
        Ok(Self { client, reconnect_enabled: AtomicBool::new(true) })
    }

    pub fn from_env() -> HostResult<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        Self::new(&url)
    }

    /// Opens a fresh multiplexed connection, retrying once after
    /// [`RECONNECT_RETRY_DELAY`] on failure when reconnection is enabled
    /// (§7 "Recovery": "Reconnection is enabled for subsequent commands").
    /// With reconnection disabled, a dropped connection fails fast instead.
    async fn conn(&self) -> HostResult<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Ok(conn),
            Err(first) => {
                if !self.reconnect_enabled.load(Ordering::SeqCst) {
                    return Err(wrap(first));
                }
                log::warn!("[store] redis connection failed, retrying once: {first}");
                sleep(RECONNECT_RETRY_DELAY).await;
                self.client.get_multiplexed_async_connection().await.map_err(wrap)
            }
        }
    }
}

impl Reconnectable for RedisStore {
    fn configure_reconnect(&self, policy: ReconnectPolicy) {
        self.reconnect_enabled.store(policy.enabled, Ordering::SeqCst);
    }
}

fn wrap(e: redis::RedisError) -> HostError {
    HostError::BadRequest(format!("redis error: {e}"))
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> HostResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(wrap)
    }

    async fn set(&self, key: &str, value: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await.map_err(wrap)
    }

    async fn del(&self, key: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(wrap)
    }

    async fn incr(&self, key: &str) -> HostResult<i64> {
        let mut conn = self.conn().await?;
        conn.incr(key, 1).await.map_err(wrap)
    }

    async fn hget(&self, key: &str, field: &str) -> HostResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.hget(key, field).await.map_err(wrap)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value).await.map_err(wrap)
    }

    async fn hdel(&self, key: &str, field: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.hdel::<_, _, ()>(key, field).await.map_err(wrap)
    }

    async fn hgetall(&self, key: &str) -> HostResult<BTreeMap<String, String>> {
        let mut conn = self.conn().await?;
        let pairs: Vec<(String, String)> = conn.hgetall(key).await.map_err(wrap)?;
        Ok(pairs.into_iter().collect())
    }

    async fn sadd(&self, key: &str, member: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.sadd::<_, _, ()>(key, member).await.map_err(wrap)
    }

    async fn srem(&self, key: &str, member: &str) -> HostResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.srem(key, member).await.map_err(wrap)?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> HostResult<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.smembers(key).await.map_err(wrap)
    }

    async fn sismember(&self, key: &str, member: &str) -> HostResult<bool> {
        let mut conn = self.conn().await?;
        conn.sismember(key, member).await.map_err(wrap)
    }

    async fn rpush(&self, key: &str, value: &str) -> HostResult<()> {
        let mut conn = self.conn().await?;
        conn.rpush::<_, _, ()>(key, value).await.map_err(wrap)
    }

    async fn lrange(&self, key: &str) -> HostResult<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.lrange(key, 0, -1).await.map_err(wrap)
    }

    async fn ltrim_front(&self, key: &str) -> HostResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.lpop(key, None).await.map_err(wrap)
    }

    async fn lclear(&self, key: &str) -> HostResult<()> {
        self.del(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_reconnect_updates_the_flag_a_dropped_connection_checks() {
        let store = RedisStore::new("redis://127.0.0.1:0").unwrap();
        assert!(store.reconnect_enabled.load(Ordering::SeqCst), "enabled by default");
        store.configure_reconnect(ReconnectPolicy { enabled: false });
        assert!(!store.reconnect_enabled.load(Ordering::SeqCst));
        store.configure_reconnect(ReconnectPolicy { enabled: true });
        assert!(store.reconnect_enabled.load(Ordering::SeqCst));
    }
}
