use crate::store::Store;
use async_trait::async_trait;
use host_core::HostResult;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

/// In-memory mirror of the source crate's own `HashMapLookup`
/// (`src/clustering/persistence/memory.rs`), generalized to the four
/// collection shapes the game store view needs. Used by tests and as the
/// cache the scheduler worker rebuilds from on startup.
#[derive(Default)]
pub struct MemoryStore {
    strings: Mutex<BTreeMap<String, String>>,
    hashes: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    sets: Mutex<BTreeMap<String, BTreeSet<String>>>,
    lists: Mutex<BTreeMap<String, VecDeque<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> HostResult<Option<String>> {
        Ok(self.strings.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> HostResult<()> {
        self.strings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> HostResult<()> {
        self.strings.lock().unwrap().remove(key);
        self.hashes.lock().unwrap().remove(key);
        self.sets.lock().unwrap().remove(key);
        self.lists.lock().unwrap().remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str) -> HostResult<i64> {
        let mut strings = self.strings.lock().unwrap();
        let entry = strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next: i64 = entry.parse().unwrap_or(0) + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn hget(&self, key: &str, field: &str) -> HostResult<Option<String>> {
        Ok(self
            .hashes
            .lock()
            .unwrap()
            .get(key)
            .and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> HostResult<()> {
        self.hashes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> HostResult<()> {
        if let Some(h) = self.hashes.lock().unwrap().get_mut(key) {
            h.remove(field);
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> HostResult<BTreeMap<String, String>> {
        Ok(self.hashes.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: &str) -> HostResult<()> {
        self.sets
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> HostResult<bool> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get_mut(key)
            .map(|s| s.remove(member))
            .unwrap_or(false))
    }

    async fn smembers(&self, key: &str) -> HostResult<Vec<String>> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sismember(&self, key: &str, member: &str) -> HostResult<bool> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.contains(member))
            .unwrap_or(false))
    }

    async fn rpush(&self, key: &str, value: &str) -> HostResult<()> {
        self.lists
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn lrange(&self, key: &str) -> HostResult<Vec<String>> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ltrim_front(&self, key: &str) -> HostResult<Option<String>> {
        Ok(self.lists.lock().unwrap().get_mut(key).and_then(|l| l.pop_front()))
    }

    async fn lclear(&self, key: &str) -> HostResult<()> {
        self.lists.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("ids:game").await.unwrap(), 1);
        assert_eq!(store.incr("ids:game").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_is_fifo() {
        let store = MemoryStore::new();
        store.rpush("queue", "a").await.unwrap();
        store.rpush("queue", "b").await.unwrap();
        assert_eq!(store.ltrim_front("queue").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.lrange("queue").await.unwrap(), vec!["b".to_string()]);
    }
}
