//! Depot service keeping the blob directory and the metadata document in
//! agreement.
//!
//! Every mutating operation runs under the per-filename lock and follows the
//! same shape: change the filesystem first, then the metadata; if the
//! metadata change fails, undo the filesystem change. An undo that fails as
//! well is logged at error level and leaves the two stores out of step until
//! an operator fixes them (see [`Depot::audit`]).

use std::collections::HashSet;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::Stream;

use super::locks::FileLocks;
use super::metadata::{JsonMetadataStore, MetadataEntry, MetadataStore};
use super::naming::{generate_filename, normalize_new_filename, validate_filename};
use super::storage::BlobStore;
use super::{APK_MEDIA_TYPE, UPLOADS_URL_PREFIX};
use crate::config::{MediaTypePolicy, StorageConfig};
use crate::{DepotError, Result};

/// Upload rules applied by [`Depot::upload`].
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Multipart field carrying the package.
    pub field_name: String,
    /// How the declared media type is checked.
    pub media_type_policy: MediaTypePolicy,
    /// Maximum accepted size in bytes.
    pub max_size: u64,
}

impl UploadPolicy {
    /// Build the policy from storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            field_name: config.upload_field.clone(),
            media_type_policy: config.media_type_policy,
            max_size: config.max_upload_size_bytes(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Generated filename.
    pub filename: String,
    /// Bytes written.
    pub size: u64,
    /// Recorded upload date.
    pub upload_date: DateTime<Utc>,
}

/// One listed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedApk {
    /// Stored filename.
    pub filename: String,
    /// Upload date from metadata.
    pub upload_date: DateTime<Utc>,
    /// Retrieval path under the uploads prefix.
    pub url: String,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether a blob was actually removed.
    pub blob_removed: bool,
    /// Number of metadata entries removed.
    pub entries_removed: usize,
}

/// Drift between the two stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Metadata entries without a blob, in metadata order.
    pub orphaned_entries: Vec<String>,
    /// `.apk` blobs without a metadata entry, sorted.
    pub untracked_blobs: Vec<String>,
    /// Blobs still under their stash name after an interrupted delete.
    pub stashed_blobs: Vec<String>,
}

impl AuditReport {
    /// True if both stores agree and no delete was left half done.
    pub fn is_consistent(&self) -> bool {
        self.orphaned_entries.is_empty()
            && self.untracked_blobs.is_empty()
            && self.stashed_blobs.is_empty()
    }
}

/// What [`Depot::recover_stashed`] did with leftover stashed blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashRecovery {
    /// Put back because metadata still lists them.
    pub restored: Vec<String>,
    /// Removed because the delete had already reached the metadata.
    pub purged: Vec<String>,
}

/// The consistency layer over blob store and metadata store.
pub struct Depot {
    blobs: BlobStore,
    metadata: Arc<dyn MetadataStore>,
    locks: FileLocks,
    policy: UploadPolicy,
    hide_orphaned_entries: bool,
}

impl Depot {
    /// Create a depot from its parts.
    pub fn new(blobs: BlobStore, metadata: Arc<dyn MetadataStore>, policy: UploadPolicy) -> Self {
        Self {
            blobs,
            metadata,
            locks: FileLocks::new(),
            policy,
            hide_orphaned_entries: true,
        }
    }

    /// Set whether listings omit entries whose blob is missing.
    pub fn with_hide_orphaned_entries(mut self, hide: bool) -> Self {
        self.hide_orphaned_entries = hide;
        self
    }

    /// Open the blob directory and JSON metadata document named in the config.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let blobs = BlobStore::new(&config.uploads_path).await?;
        let metadata = JsonMetadataStore::open(PathBuf::from(&config.metadata_path)).await?;

        Ok(Self::new(blobs, Arc::new(metadata), UploadPolicy::from_config(config))
            .with_hide_orphaned_entries(config.hide_orphaned_entries))
    }

    /// The underlying blob store.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// The active upload policy.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Apply the media type policy to a declared content type.
    pub fn check_media_type(&self, content_type: Option<&str>) -> Result<()> {
        let essence = content_type.map(|ct| ct.split(';').next().unwrap_or(ct).trim());
        let matches = essence.is_some_and(|e| e.eq_ignore_ascii_case(APK_MEDIA_TYPE));

        match (self.policy.media_type_policy, matches) {
            (_, true) => Ok(()),
            (MediaTypePolicy::Strict, false) => Err(DepotError::UnsupportedMediaType(
                content_type.unwrap_or("none").to_string(),
            )),
            (MediaTypePolicy::Permissive, false) => {
                tracing::warn!(
                    content_type = content_type.unwrap_or("none"),
                    "Accepting upload with unexpected media type"
                );
                Ok(())
            }
        }
    }

    /// Store an uploaded package and record its metadata.
    ///
    /// Exactly one blob and one entry are created, or neither.
    pub async fn upload<S, B, E>(
        &self,
        field_name: &str,
        content_type: Option<&str>,
        stream: S,
    ) -> Result<UploadOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.upload_at(field_name, content_type, stream, Utc::now())
            .await
    }

    async fn upload_at<S, B, E>(
        &self,
        field_name: &str,
        content_type: Option<&str>,
        stream: S,
        now: DateTime<Utc>,
    ) -> Result<UploadOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.check_media_type(content_type)?;

        let filename = generate_filename(field_name, now);
        validate_filename(&filename)?;

        let _guard = self.locks.lock(&filename).await;

        let size = self
            .blobs
            .save_stream(&filename, stream, self.policy.max_size)
            .await?;

        if let Err(e) = self
            .metadata
            .append(MetadataEntry::new(filename.clone(), now))
            .await
        {
            tracing::warn!(filename = %filename, error = %e, "Metadata append failed, removing blob");
            if let Err(undo) = self.blobs.delete(&filename).await {
                tracing::error!(
                    filename = %filename,
                    error = %undo,
                    "Failed to remove blob after metadata failure; blob is untracked"
                );
            }
            return Err(e);
        }

        tracing::info!(filename = %filename, size, "Stored APK");

        Ok(UploadOutcome {
            filename,
            size,
            upload_date: now,
        })
    }

    /// List packages in upload order.
    pub async fn list(&self) -> Result<Vec<ListedApk>> {
        let entries = self.metadata.list().await?;

        let mut listed = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.hide_orphaned_entries && !self.blobs.exists(&entry.filename).await? {
                tracing::warn!(filename = %entry.filename, "Hiding metadata entry without blob");
                continue;
            }
            listed.push(ListedApk {
                url: retrieval_url(&entry.filename),
                filename: entry.filename,
                upload_date: entry.upload_date,
            });
        }

        Ok(listed)
    }

    /// Rename a package, returning the normalized new filename.
    pub async fn rename(&self, old_filename: &str, new_filename: &str) -> Result<String> {
        validate_filename(old_filename)?;
        let new_filename = normalize_new_filename(new_filename)?;

        let _guard = self
            .locks
            .lock_all(&[old_filename, new_filename.as_str()])
            .await;

        let entries = self.metadata.list().await?;
        if !entries.iter().any(|e| e.filename == old_filename) {
            return Err(DepotError::NotFound(format!(
                "metadata entry for '{old_filename}'"
            )));
        }

        if new_filename != old_filename
            && (entries.iter().any(|e| e.filename == new_filename)
                || self.blobs.exists(&new_filename).await?)
        {
            return Err(DepotError::Conflict(format!("{new_filename} already exists")));
        }

        self.blobs.rename(old_filename, &new_filename).await?;

        let failure = match self.metadata.update_by_key(old_filename, &new_filename).await {
            Ok(true) => None,
            Ok(false) => Some(DepotError::NotFound(format!(
                "metadata entry for '{old_filename}'"
            ))),
            Err(e) => Some(e),
        };

        if let Some(e) = failure {
            tracing::warn!(
                old = old_filename,
                new = %new_filename,
                error = %e,
                "Metadata update failed, reverting rename"
            );
            if let Err(undo) = self.blobs.rename(&new_filename, old_filename).await {
                tracing::error!(
                    old = old_filename,
                    new = %new_filename,
                    error = %undo,
                    "Failed to revert rename; stores are out of step"
                );
            }
            return Err(e);
        }

        tracing::info!(old = old_filename, new = %new_filename, "Renamed APK");
        Ok(new_filename)
    }

    /// Delete a package and every metadata entry naming it.
    ///
    /// A blob that is already gone is not an error.
    pub async fn delete(&self, filename: &str) -> Result<DeleteOutcome> {
        validate_filename(filename)?;

        let _guard = self.locks.lock(filename).await;

        let stashed = self.blobs.stash(filename).await?;

        let entries_removed = match self.metadata.remove_by_key(filename).await {
            Ok(removed) => removed,
            Err(e) => {
                if let Some(stashed) = stashed {
                    tracing::warn!(filename, error = %e, "Metadata update failed, restoring blob");
                    if let Err(undo) = self.blobs.restore(stashed).await {
                        tracing::error!(
                            filename,
                            error = %undo,
                            "Failed to restore blob; it remains under its stash name"
                        );
                    }
                }
                return Err(e);
            }
        };

        let blob_removed = stashed.is_some();
        if let Some(stashed) = stashed {
            if let Err(e) = self.blobs.purge(stashed).await {
                tracing::warn!(filename, error = %e, "Failed to purge stashed blob");
            }
        }

        tracing::info!(filename, blob_removed, entries_removed, "Deleted APK");
        Ok(DeleteOutcome {
            blob_removed,
            entries_removed,
        })
    }

    /// Compare the metadata document with the blob directory.
    pub async fn audit(&self) -> Result<AuditReport> {
        let entries = self.metadata.list().await?;
        let blobs = self.blobs.list_names().await?;
        let stashed_blobs = self
            .blobs
            .list_stashed()
            .await?
            .iter()
            .map(|s| s.filename().to_string())
            .collect();

        let blob_set: HashSet<&str> = blobs.iter().map(String::as_str).collect();
        let entry_set: HashSet<&str> = entries.iter().map(|e| e.filename.as_str()).collect();

        let orphaned_entries = entries
            .iter()
            .filter(|e| !blob_set.contains(e.filename.as_str()))
            .map(|e| e.filename.clone())
            .collect();
        let untracked_blobs = blobs
            .iter()
            .filter(|b| !entry_set.contains(b.as_str()))
            .cloned()
            .collect();

        Ok(AuditReport {
            orphaned_entries,
            untracked_blobs,
            stashed_blobs,
        })
    }

    /// Finish deletes that were interrupted between stash and purge.
    ///
    /// A stashed blob whose name is still in the metadata goes back in place
    /// (the delete never committed). Otherwise, or if a blob of that name
    /// exists again, the stash is removed.
    pub async fn recover_stashed(&self) -> Result<StashRecovery> {
        let mut recovery = StashRecovery::default();

        for stashed in self.blobs.list_stashed().await? {
            let filename = stashed.filename().to_string();
            let _guard = self.locks.lock(&filename).await;

            let tracked = self
                .metadata
                .list()
                .await?
                .iter()
                .any(|e| e.filename == filename);

            if tracked && !self.blobs.exists(&filename).await? {
                self.blobs.restore(stashed).await?;
                tracing::info!(filename = %filename, "Restored interrupted delete");
                recovery.restored.push(filename);
            } else {
                self.blobs.purge(stashed).await?;
                tracing::info!(filename = %filename, "Purged leftover stashed blob");
                recovery.purged.push(filename);
            }
        }

        Ok(recovery)
    }
}

/// Retrieval path for a stored filename.
pub fn retrieval_url(filename: &str) -> String {
    format!("{}/{}", UPLOADS_URL_PREFIX, urlencoding::encode(filename))
}
