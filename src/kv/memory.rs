use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::KvStore;
use crate::error::AppResult;

/// In-memory store for tests and throwaway sessions
#[derive(Clone, Debug, Default)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut matches: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches.into_iter().map(|(_, v)| v).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let kv = MemoryKv::new();
        assert!(kv.get("a").await.unwrap().is_none());

        kv.set("a", "1".to_string()).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));

        kv.del("a").await.unwrap();
        kv.del("a").await.unwrap();
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_scan() {
        let kv = MemoryKv::new();
        kv.set("tool:b", "B".to_string()).await.unwrap();
        kv.set("tool:a", "A".to_string()).await.unwrap();
        kv.set("other", "X".to_string()).await.unwrap();

        let values = kv.get_by_prefix("tool:").await.unwrap();
        assert_eq!(values, vec!["A", "B"]);
        assert_eq!(kv.len(), 3);
    }
}
