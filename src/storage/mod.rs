//! Storage adapters
//!
//! One contract, [`ToolStore`], with interchangeable implementations chosen
//! once at start-up by [`open`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::{BackendConfig, BackendMode, HttpConfig};
use crate::entity::{Tool, ToolInput, ToolPatch};
use crate::error::AppResult;
use crate::kv::{FileKv, KvStore, MemoryKv};

mod edge;
mod kv_backed;
mod local;
mod rest;

pub use edge::EdgeStore;
pub use kv_backed::{KvToolStore, TOOL_KEY_PREFIX};
pub use local::{LocalStore, STORAGE_KEY};
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Rest,
    Edge,
    Kv,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "local",
            BackendKind::Rest => "rest",
            BackendKind::Edge => "edge",
            BackendKind::Kv => "kv",
        };
        f.write_str(name)
    }
}

impl BackendKind {
    /// Where this backend keeps the data, for start-up and check output
    pub fn description(&self) -> &'static str {
        match self {
            BackendKind::Local => "local storage, data kept on this machine",
            BackendKind::Rest => "hosted table API, data kept in the cloud",
            BackendKind::Edge => "function-style API, data kept in the cloud",
            BackendKind::Kv => "key-value store behind the function-style API",
        }
    }
}

/// Create/read/update/delete plus bulk group operations over tool entries
#[async_trait]
pub trait ToolStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Contact the backend without changing anything; errors describe why it
    /// cannot be reached
    async fn ping(&self) -> AppResult<()>;

    /// All entries. A store that has not been provisioned yet yields an empty list.
    async fn list(&self) -> AppResult<Vec<Tool>>;

    /// Persist a new entry; the store assigns `id` and `createdAt`
    async fn create(&self, input: ToolInput) -> AppResult<Tool>;

    /// Apply the provided fields; `NotFound` when `id` does not exist
    async fn update(&self, id: &str, patch: ToolPatch) -> AppResult<Tool>;

    /// Remove an entry. Removing a missing id is not an error.
    async fn remove(&self, id: &str) -> AppResult<bool>;

    /// Move every entry of `old_name` to `new_name`, returning how many moved
    async fn rename_group(&self, old_name: &str, new_name: &str) -> AppResult<usize>;

    /// Move every entry of `group_name` to "未分组", returning how many moved
    async fn delete_group(&self, group_name: &str) -> AppResult<usize>;
}

/// True when a rename would change nothing and must not reach the backend
pub fn is_noop_rename(old_name: &str, new_name: &str) -> bool {
    new_name.trim().is_empty() || new_name == old_name
}

pub(crate) fn http_client(http: &HttpConfig) -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(http.timeout()).build()?)
}

/// Build the adapter selected by `backend.mode`
pub async fn open(backend: &BackendConfig, http: &HttpConfig) -> AppResult<Arc<dyn ToolStore>> {
    let store: Arc<dyn ToolStore> = match backend.mode {
        BackendMode::Local => {
            let kv: Arc<dyn KvStore> = match &backend.local.path {
                Some(path) => Arc::new(FileKv::open(path).await?),
                None => Arc::new(MemoryKv::new()),
            };
            Arc::new(LocalStore::new(kv))
        }
        BackendMode::Rest => Arc::new(RestStore::new(&backend.rest, http_client(http)?)?),
        BackendMode::Edge => Arc::new(EdgeStore::new(&backend.edge, http_client(http)?)?),
    };
    tracing::info!(
        "Using {} storage backend ({})",
        store.kind(),
        store.kind().description()
    );
    Ok(store)
}
