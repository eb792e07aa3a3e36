//! Metadata entries and the JSON-file store that persists them.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{DepotError, Result};

/// Metadata recorded for one stored package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    /// Stored filename of the blob.
    pub filename: String,
    /// When the package was uploaded.
    #[serde(with = "crate::datetime::iso8601")]
    pub upload_date: DateTime<Utc>,
}

impl MetadataEntry {
    /// Create a new entry.
    pub fn new(filename: impl Into<String>, upload_date: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            upload_date,
        }
    }
}

/// Capability interface over the ordered metadata sequence.
///
/// Implementations serialize their own read-modify-write cycles; callers
/// never see a half-applied mutation.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All entries in upload order.
    async fn list(&self) -> Result<Vec<MetadataEntry>>;

    /// Append an entry at the end of the sequence.
    async fn append(&self, entry: MetadataEntry) -> Result<()>;

    /// Rename the first entry whose filename equals `key`.
    ///
    /// Returns `false` (and writes nothing) if no entry matches.
    async fn update_by_key(&self, key: &str, new_filename: &str) -> Result<bool>;

    /// Remove every entry whose filename equals `key`.
    ///
    /// Returns the number of removed entries; zero is not an error.
    async fn remove_by_key(&self, key: &str) -> Result<usize>;
}

/// Metadata store persisted as one pretty-printed JSON array.
///
/// Every operation reads the whole document; every mutation rewrites it
/// through a temporary file followed by a rename.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMetadataStore {
    /// Open the store, writing an empty document if none exists yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        if !fs::try_exists(&store.path).await? {
            store.write_entries(&[]).await?;
            tracing::info!(path = %store.path.display(), "Created empty metadata document");
        }

        Ok(store)
    }

    /// Path of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<MetadataEntry>> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Metadata document missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(DepotError::Metadata(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_slice(&content).map_err(|e| {
            DepotError::Metadata(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    async fn write_entries(&self, entries: &[MetadataEntry]) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let write = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &self.path).await
        };

        write.await.map_err(|e| {
            DepotError::Metadata(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn list(&self) -> Result<Vec<MetadataEntry>> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn append(&self, entry: MetadataEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.push(entry);
        self.write_entries(&entries).await
    }

    async fn update_by_key(&self, key: &str, new_filename: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let Some(entry) = entries.iter_mut().find(|e| e.filename == key) else {
            return Ok(false);
        };
        entry.filename = new_filename.to_string();

        self.write_entries(&entries).await?;
        Ok(true)
    }

    async fn remove_by_key(&self, key: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;

        let before = entries.len();
        entries.retain(|e| e.filename != key);
        let removed = before - entries.len();

        if removed > 0 {
            self.write_entries(&entries).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn setup_store() -> (TempDir, JsonMetadataStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(temp_dir.path().join("data").join("apks.json"))
            .await
            .unwrap();
        (temp_dir, store)
    }

    fn entry(name: &str, millis: i64) -> MetadataEntry {
        MetadataEntry::new(name, Utc.timestamp_millis_opt(millis).unwrap())
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(entry("apk-1.apk", 1_705_314_600_123)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "apk-1.apk",
                "uploadDate": "2024-01-15T10:30:00.123Z"
            })
        );
    }

    #[test]
    fn test_entry_rejects_bad_date() {
        let result = serde_json::from_str::<MetadataEntry>(
            r#"{"filename": "a.apk", "uploadDate": "yesterday"}"#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_creates_empty_document() {
        let (_temp_dir, store) = setup_store().await;

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.trim(), "[]");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apks.json");
        std::fs::write(
            &path,
            r#"[{"filename": "a.apk", "uploadDate": "2024-01-15T10:30:00.000Z"}]"#,
        )
        .unwrap();

        let store = JsonMetadataStore::open(&path).await.unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "a.apk");
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let (_temp_dir, store) = setup_store().await;

        store.append(entry("first.apk", 1)).await.unwrap();
        store.append(entry("second.apk", 2)).await.unwrap();
        store.append(entry("third.apk", 3)).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.filename)
            .collect();
        assert_eq!(names, vec!["first.apk", "second.apk", "third.apk"]);
    }

    #[tokio::test]
    async fn test_update_by_key_first_match_only() {
        let (_temp_dir, store) = setup_store().await;
        store.append(entry("dup.apk", 1)).await.unwrap();
        store.append(entry("dup.apk", 2)).await.unwrap();

        assert!(store.update_by_key("dup.apk", "renamed.apk").await.unwrap());

        let entries = store.list().await.unwrap();
        assert_eq!(entries[0].filename, "renamed.apk");
        assert_eq!(entries[0].upload_date, entry("x", 1).upload_date);
        assert_eq!(entries[1].filename, "dup.apk");
    }

    #[tokio::test]
    async fn test_update_by_key_missing() {
        let (_temp_dir, store) = setup_store().await;
        store.append(entry("a.apk", 1)).await.unwrap();

        assert!(!store.update_by_key("missing.apk", "b.apk").await.unwrap());
        assert_eq!(store.list().await.unwrap()[0].filename, "a.apk");
    }

    #[tokio::test]
    async fn test_remove_by_key_removes_all_matches() {
        let (_temp_dir, store) = setup_store().await;
        store.append(entry("a.apk", 1)).await.unwrap();
        store.append(entry("b.apk", 2)).await.unwrap();
        store.append(entry("a.apk", 3)).await.unwrap();

        assert_eq!(store.remove_by_key("a.apk").await.unwrap(), 2);

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "b.apk");
    }

    #[tokio::test]
    async fn test_remove_by_key_idempotent() {
        let (_temp_dir, store) = setup_store().await;
        store.append(entry("a.apk", 1)).await.unwrap();

        assert_eq!(store.remove_by_key("missing.apk").await.unwrap(), 0);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let (_temp_dir, store) = setup_store().await;
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.list().await, Err(DepotError::Metadata(_))));
        assert!(matches!(
            store.append(entry("a.apk", 1)).await,
            Err(DepotError::Metadata(_))
        ));
        // A failed append must leave the document untouched.
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let (temp_dir, store) = setup_store().await;
        store.append(entry("a.apk", 1)).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(temp_dir.path().join("data"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["apks.json".to_string()]);
    }
}
