//! Local adapter
//!
//! The whole entry set lives as one serialized JSON array under a single key.
//! Every operation reads the block, mutates it in memory and writes it back.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{is_noop_rename, BackendKind, ToolStore};
use crate::entity::{Tool, ToolInput, ToolPatch, GROUP_UNGROUPED};
use crate::error::{AppResult, OptionExt};
use crate::kv::KvStore;
use crate::mapper;

/// Key the serialized block is stored under
pub const STORAGE_KEY: &str = "fracking-tools-data";

pub struct LocalStore {
    kv: Arc<dyn KvStore>,
    /// Serializes read-modify-write cycles on the block
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// Drop every stored entry
    pub async fn clear(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.kv.del(STORAGE_KEY).await?;
        tracing::info!("Cleared local tool data");
        Ok(())
    }

    async fn load(&self) -> AppResult<Vec<Tool>> {
        match self.kv.get(STORAGE_KEY).await? {
            Some(block) => Ok(mapper::decode_stored_list(serde_json::from_str(&block)?)),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, tools: &[Tool]) -> AppResult<()> {
        self.kv.set(STORAGE_KEY, serde_json::to_string(tools)?).await
    }

    /// Set `group` to `to` on every entry in `from`
    async fn regroup(&self, from: &str, to: &str) -> AppResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.load().await?;
        let mut count = 0;
        for tool in tools.iter_mut().filter(|t| t.group == from) {
            tool.group = to.to_string();
            count += 1;
        }
        if count > 0 {
            self.save(&tools).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl ToolStore for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn ping(&self) -> AppResult<()> {
        self.load().await.map(|_| ())
    }

    async fn list(&self) -> AppResult<Vec<Tool>> {
        match self.load().await {
            Ok(tools) => Ok(tools),
            Err(e) => {
                tracing::error!("获取工具数据失败: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn create(&self, input: ToolInput) -> AppResult<Tool> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.load().await?;
        let tool = Tool::create(input);
        tools.push(tool.clone());
        self.save(&tools).await?;
        tracing::debug!("Created tool {}", tool.id);
        Ok(tool)
    }

    async fn update(&self, id: &str, patch: ToolPatch) -> AppResult<Tool> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.load().await?;
        let tool = tools
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_not_found(id)?;
        tool.apply(patch);
        let updated = tool.clone();
        self.save(&tools).await?;
        Ok(updated)
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.load().await?;
        let before = tools.len();
        tools.retain(|t| t.id != id);
        if tools.len() != before {
            self.save(&tools).await?;
        }
        Ok(true)
    }

    async fn rename_group(&self, old_name: &str, new_name: &str) -> AppResult<usize> {
        if is_noop_rename(old_name, new_name) {
            return Ok(0);
        }
        self.regroup(old_name, new_name).await
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<usize> {
        self.regroup(group_name, GROUP_UNGROUPED).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::storage::testing;

    fn store() -> (LocalStore, MemoryKv) {
        let kv = MemoryKv::new();
        (LocalStore::new(Arc::new(kv.clone())), kv)
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (store, _) = store();
        testing::lifecycle(&store).await;
    }

    #[tokio::test]
    async fn test_updates_are_scoped() {
        let (store, _) = store();
        testing::updates_are_scoped(&store).await;
    }

    #[tokio::test]
    async fn test_block_is_single_key() {
        let (store, kv) = store();
        store.create(testing::input("A", "G")).await.unwrap();
        store.create(testing::input("B", "G")).await.unwrap();
        assert_eq!(kv.len(), 1);

        let block = kv.get(STORAGE_KEY).await.unwrap().unwrap();
        let parsed: Vec<Tool> = serde_json::from_str(&block).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_block_lists_empty() {
        let (store, kv) = store();
        kv.set(STORAGE_KEY, "[{oops".to_string()).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.create(testing::input("A", "G")).await.is_err());
    }

    #[tokio::test]
    async fn test_noop_rename_leaves_block_untouched() {
        let (store, kv) = store();
        assert_eq!(store.rename_group("G", "G").await.unwrap(), 0);
        assert_eq!(store.rename_group("G", " ").await.unwrap(), 0);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_ping_reports_corrupt_block() {
        let (store, kv) = store();
        assert!(store.ping().await.is_ok());
        kv.set(STORAGE_KEY, "[{oops".to_string()).await.unwrap();
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, kv) = store();
        store.create(testing::input("A", "G")).await.unwrap();
        store.clear().await.unwrap();
        assert!(kv.is_empty());
        assert!(store.list().await.unwrap().is_empty());
    }
}
