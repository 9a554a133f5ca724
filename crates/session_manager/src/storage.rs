//! Persisted client state: the `sessionId` and `chatHistory` keys

use crate::error::Result;
use async_trait::async_trait;
use chat_core::ChatHistory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

/// Persisted state trait
#[async_trait]
pub trait PersistedState: Send + Sync {
    /// Load the id of the session mounted last
    async fn load_session_id(&self) -> Result<Option<String>>;

    /// Remember the mounted session id
    async fn save_session_id(&self, session_id: &str) -> Result<()>;

    /// Forget the mounted session id
    async fn clear_session_id(&self) -> Result<()>;

    /// Load the local chat history (empty if never saved)
    async fn load_chat_history(&self) -> Result<ChatHistory>;

    /// Save the local chat history
    async fn save_chat_history(&self, history: &ChatHistory) -> Result<()>;

    /// Delete the local chat history
    async fn clear_chat_history(&self) -> Result<()>;
}

/// On-disk layout, one object keyed like browser local storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct PersistedDocument {
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,

    #[serde(rename = "chatHistory", default, skip_serializing_if = "Option::is_none")]
    chat_history: Option<ChatHistory>,
}

/// File-based persisted state
pub struct FileStateStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<PersistedDocument> {
        if !self.path.exists() {
            return Ok(PersistedDocument::default());
        }

        let contents = fs::read_to_string(&self.path).await?;
        if contents.trim().is_empty() {
            return Ok(PersistedDocument::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write_document(&self, document: &PersistedDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, contents).await?;
        Ok(())
    }

    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut PersistedDocument) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        change(&mut document);
        self.write_document(&document).await
    }
}

#[async_trait]
impl PersistedState for FileStateStorage {
    async fn load_session_id(&self) -> Result<Option<String>> {
        Ok(self.read_document().await?.session_id)
    }

    async fn save_session_id(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.update(move |doc| doc.session_id = Some(session_id)).await
    }

    async fn clear_session_id(&self) -> Result<()> {
        self.update(|doc| doc.session_id = None).await
    }

    async fn load_chat_history(&self) -> Result<ChatHistory> {
        Ok(self.read_document().await?.chat_history.unwrap_or_default())
    }

    async fn save_chat_history(&self, history: &ChatHistory) -> Result<()> {
        let history = history.clone();
        self.update(move |doc| doc.chat_history = Some(history)).await
    }

    async fn clear_chat_history(&self) -> Result<()> {
        self.update(|doc| doc.chat_history = None).await
    }
}

/// In-memory persisted state, lost when dropped
#[derive(Default)]
pub struct MemoryStateStorage {
    document: RwLock<PersistedDocument>,
}

impl MemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistedState for MemoryStateStorage {
    async fn load_session_id(&self) -> Result<Option<String>> {
        Ok(self.document.read().await.session_id.clone())
    }

    async fn save_session_id(&self, session_id: &str) -> Result<()> {
        self.document.write().await.session_id = Some(session_id.to_string());
        Ok(())
    }

    async fn clear_session_id(&self) -> Result<()> {
        self.document.write().await.session_id = None;
        Ok(())
    }

    async fn load_chat_history(&self) -> Result<ChatHistory> {
        Ok(self
            .document
            .read()
            .await
            .chat_history
            .clone()
            .unwrap_or_default())
    }

    async fn save_chat_history(&self, history: &ChatHistory) -> Result<()> {
        self.document.write().await.chat_history = Some(history.clone());
        Ok(())
    }

    async fn clear_chat_history(&self) -> Result<()> {
        self.document.write().await.chat_history = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = FileStateStorage::new(dir.path().join("state.json"));

        let mut history = ChatHistory::new();
        history.record("Hello", Utc::now());

        storage.save_session_id("session-1").await.unwrap();
        storage.save_chat_history(&history).await.unwrap();

        assert_eq!(
            storage.load_session_id().await.unwrap().as_deref(),
            Some("session-1")
        );
        assert_eq!(storage.load_chat_history().await.unwrap(), history);
    }

    #[tokio::test]
    async fn test_file_storage_uses_local_storage_keys() {
        let dir = tempdir().unwrap();
        let storage = FileStateStorage::new(dir.path().join("nested").join("state.json"));

        storage.save_session_id("abc").await.unwrap();
        storage.save_chat_history(&ChatHistory::new()).await.unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["sessionId"], "abc");
        assert!(value["chatHistory"].is_array());
    }

    #[tokio::test]
    async fn test_file_storage_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStateStorage::new(dir.path().join("state.json"));

        assert!(storage.load_session_id().await.unwrap().is_none());
        assert!(storage.load_chat_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_clear_keeps_other_key() {
        let dir = tempdir().unwrap();
        let storage = FileStateStorage::new(dir.path().join("state.json"));

        let mut history = ChatHistory::new();
        history.record("Hello", Utc::now());
        storage.save_session_id("session-1").await.unwrap();
        storage.save_chat_history(&history).await.unwrap();

        storage.clear_session_id().await.unwrap();
        assert!(storage.load_session_id().await.unwrap().is_none());
        assert_eq!(storage.load_chat_history().await.unwrap().len(), 1);

        storage.clear_chat_history().await.unwrap();
        assert!(storage.load_chat_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStateStorage::new(&path);
        assert!(storage.load_chat_history().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStateStorage::new();
        storage.save_session_id("s").await.unwrap();
        storage.clear_session_id().await.unwrap();
        assert!(storage.load_session_id().await.unwrap().is_none());
    }
}
