//! Record-per-key adapter behind the function-style API
//!
//! Each entry is stored under `"tool:" + id`. Group rename/delete scan the
//! prefix and rewrite matching records one by one; there is no atomic bulk
//! update, so a failure mid-scan leaves a subset of the group moved.

use async_trait::async_trait;
use std::sync::Arc;

use super::{is_noop_rename, BackendKind, ToolStore};
use crate::entity::{Tool, ToolInput, ToolPatch, GROUP_UNGROUPED};
use crate::error::{AppError, AppResult, OptionExt};
use crate::kv::KvStore;
use crate::mapper;

pub const TOOL_KEY_PREFIX: &str = "tool:";

fn tool_key(id: &str) -> String {
    format!("{}{}", TOOL_KEY_PREFIX, id)
}

pub struct KvToolStore {
    kv: Arc<dyn KvStore>,
}

impl KvToolStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn put(&self, tool: &Tool) -> AppResult<()> {
        self.kv.set(&tool_key(&tool.id), serde_json::to_string(tool)?).await
    }

    async fn scan(&self) -> AppResult<Vec<Tool>> {
        let values = self.kv.get_by_prefix(TOOL_KEY_PREFIX).await?;
        Ok(values
            .iter()
            .filter_map(|raw| match serde_json::from_str(raw) {
                Ok(value) => mapper::decode_stored(value),
                Err(e) => {
                    tracing::warn!("Skipping unparsable tool record: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn regroup(&self, from: &str, to: &str) -> AppResult<usize> {
        let matching: Vec<Tool> = self
            .scan()
            .await?
            .into_iter()
            .filter(|t| t.group == from)
            .collect();

        for mut tool in matching.iter().cloned() {
            tool.group = to.to_string();
            self.put(&tool).await?;
        }
        Ok(matching.len())
    }
}

#[async_trait]
impl ToolStore for KvToolStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Kv
    }

    async fn ping(&self) -> AppResult<()> {
        self.kv.get_by_prefix(TOOL_KEY_PREFIX).await.map(|_| ())
    }

    async fn list(&self) -> AppResult<Vec<Tool>> {
        self.scan().await
    }

    async fn create(&self, input: ToolInput) -> AppResult<Tool> {
        let tool = Tool::create(input);
        self.put(&tool).await?;
        Ok(tool)
    }

    async fn update(&self, id: &str, patch: ToolPatch) -> AppResult<Tool> {
        let raw = self
            .kv
            .get(&tool_key(id))
            .await?
            .ok_or_not_found(id)?;
        let mut tool = mapper::decode_stored(serde_json::from_str(&raw)?)
            .ok_or_else(|| AppError::Internal(format!("unreadable record {}", id)))?;
        tool.apply(patch);
        self.put(&tool).await?;
        Ok(tool)
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        self.kv.del(&tool_key(id)).await?;
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
