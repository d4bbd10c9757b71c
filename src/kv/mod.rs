//! Key-value backends
//!
//! String values under string keys. The local adapter keeps its single
//! serialized block here and the function-style server keeps one record per
//! `"tool:" + id` key.

use async_trait::async_trait;

use crate::error::AppResult;

mod file;
mod memory;

pub use file::FileKv;
pub use memory::MemoryKv;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> AppResult<()>;

    async fn del(&self, key: &str) -> AppResult<()>;

    /// All values whose key starts with `prefix`, in key order
    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;
}
