use async_trait::async_trait;
use host_core::HostResult;
use std::collections::BTreeMap;

/// The external key/value store (§1 EXTERNAL COLLABORATORS): a hash/set/list/
/// string store with atomic single-key operations. Grounded in the source
/// crate's own `Storage` trait (`src/clustering/persistence/storage.rs`),
/// generalized from a fixed two-field lookup to the general-purpose shape
/// the game store view needs.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> HostResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> HostResult<()>;
    async fn del(&self, key: &str) -> HostResult<()>;

    /// Atomically increments the integer at `key` (creating it at 0 first)
    /// and returns the new value. Used for monotonic id allocation (§4.4).
    async fn incr(&self, key: &str) -> HostResult<i64>;

    async fn hget(&self, key: &str, field: &str) -> HostResult<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> HostResult<()>;
    async fn hdel(&self, key: &str, field: &str) -> HostResult<()>;
    async fn hgetall(&self, key: &str) -> HostResult<BTreeMap<String, String>>;

    async fn sadd(&self, key: &str, member: &str) -> HostResult<()>;
    async fn srem(&self, key: &str, member: &str) -> HostResult<bool>;
    async fn smembers(&self, key: &str) -> HostResult<Vec<String>>;
    async fn sismember(&self, key: &str, member: &str) -> HostResult<bool>;

    async fn rpush(&self, key: &str, value: &str) -> HostResult<()>;
    async fn lrange(&self, key: &str) -> HostResult<Vec<String>>;
    async fn ltrim_front(&self, key: &str) -> HostResult<Option<String>>;
    async fn lclear(&self, key: &str) -> HostResult<()>;
}
