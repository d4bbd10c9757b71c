use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use super::KvStore;
use crate::error::AppResult;

/// Store persisted as one JSON object on disk.
///
/// The whole map is kept in memory and rewritten on every change through a
/// temp file + rename, so a crash mid-write leaves the previous snapshot.
#[derive(Clone, Debug)]
pub struct FileKv {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileKv {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Opened kv snapshot {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        // Memory only changes once the snapshot is on disk
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kv.json");

        let kv = FileKv::open(&path).await.unwrap();
        kv.set("tool:1", "one".to_string()).await.unwrap();
        kv.set("tool:2", "two".to_string()).await.unwrap();
        kv.set("zzz", "other".to_string()).await.unwrap();
        kv.del("tool:2").await.unwrap();

        let reopened = FileKv::open(&path).await.unwrap();
        assert_eq!(reopened.get("tool:1").await.unwrap().as_deref(), Some("one"));
        assert!(reopened.get("tool:2").await.unwrap().is_none());
        assert_eq!(reopened.get_by_prefix("tool:").await.unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::open(dir.path().join("absent.json")).await.unwrap();
        assert!(kv.get_by_prefix("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let kv = FileKv::open(&path).await.unwrap();
        kv.set("kept", "old".to_string()).await.unwrap();

        // A directory where the temp file should go makes every write fail
        std::fs::create_dir(dir.path().join("kv.tmp")).unwrap();

        assert!(kv.set("k", "v".to_string()).await.is_err());
        assert!(kv.get("k").await.unwrap().is_none());

        assert!(kv.set("kept", "new".to_string()).await.is_err());
        assert_eq!(kv.get("kept").await.unwrap().as_deref(), Some("old"));

        assert!(kv.del("kept").await.is_err());
        assert_eq!(kv.get("kept").await.unwrap().as_deref(), Some("old"));

        let reopened = FileKv::open(&path).await.unwrap();
        assert_eq!(reopened.get("kept").await.unwrap().as_deref(), Some("old"));
        assert!(reopened.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FileKv::open(&path).await.is_err());
    }
}
