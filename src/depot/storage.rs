//! Blob storage for APK Depot.
//!
//! Blobs live flat in a single directory under their generated (or renamed)
//! filename, so the directory can be served as-is under `/uploads`:
//! ```text
//! {base_path}/
//! ├── apk-1705314600123.apk
//! ├── release-2.4.apk
//! └── .old.apk.deleting      (transient, during delete)
//! ```

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::naming::has_apk_extension;
use super::STASH_SUFFIX;
use crate::{DepotError, Result};

/// A blob moved aside by [`BlobStore::stash`], pending purge or restore.
#[derive(Debug)]
pub struct StashedBlob {
    filename: String,
    path: PathBuf,
}

impl StashedBlob {
    /// The filename the blob had before it was stashed.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Blob store managing the uploads directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    /// Directory holding the blobs.
    base_path: PathBuf,
}

impl BlobStore {
    /// Open a blob store, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        tracing::info!(path = %base_path.display(), "Initialized blob store");

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full file path for a stored name.
    pub fn get_file_path(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    fn stash_path(&self, filename: &str) -> PathBuf {
        self.base_path.join(format!(".{filename}{STASH_SUFFIX}"))
    }

    /// Check if a blob exists.
    pub async fn exists(&self, filename: &str) -> Result<bool> {
        Ok(fs::try_exists(self.get_file_path(filename)).await?)
    }

    /// Stream content into a new blob.
    ///
    /// The blob is created with create-new semantics, so an existing file is
    /// never overwritten (`Conflict`). If the stream fails or grows beyond
    /// `max_size` bytes, the partial file is removed before returning.
    ///
    /// Returns the number of bytes written.
    pub async fn save_stream<S, B, E>(&self, filename: &str, stream: S, max_size: u64) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let path = self.get_file_path(filename);

        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DepotError::Conflict(format!("{filename} already exists")));
            }
            Err(e) => return Err(e.into()),
        };

        match Self::write_stream(file, stream, max_size).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    tracing::error!(
                        filename,
                        error = %cleanup,
                        "Failed to remove partial upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn write_stream<S, B, E>(mut file: fs::File, stream: S, max_size: u64) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DepotError::Upload(e.to_string()))?;
            let bytes = chunk.as_ref();

            written += bytes.len() as u64;
            if written > max_size {
                return Err(DepotError::TooLarge(max_size));
            }

            file.write_all(bytes).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }

    /// Rename a blob in place.
    ///
    /// Fails with `NotFound` if the source blob does not exist. The target
    /// is not checked here; callers hold the locks and check for collisions.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        match fs::rename(self.get_file_path(from), self.get_file_path(to)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DepotError::NotFound(format!("APK file '{from}'")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it didn't exist.
    pub async fn delete(&self, filename: &str) -> Result<bool> {
        match fs::remove_file(self.get_file_path(filename)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Move a blob aside under a hidden name so the removal can be undone.
    ///
    /// Returns `None` if the blob doesn't exist.
    pub async fn stash(&self, filename: &str) -> Result<Option<StashedBlob>> {
        let path = self.stash_path(filename);
        match fs::rename(self.get_file_path(filename), &path).await {
            Ok(()) => Ok(Some(StashedBlob {
                filename: filename.to_string(),
                path,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Put a stashed blob back under its original name.
    pub async fn restore(&self, stashed: StashedBlob) -> Result<()> {
        fs::rename(&stashed.path, self.get_file_path(&stashed.filename)).await?;
        Ok(())
    }

    /// Permanently remove a stashed blob.
    pub async fn purge(&self, stashed: StashedBlob) -> Result<()> {
        fs::remove_file(&stashed.path).await?;
        Ok(())
    }

    /// Find blobs left behind under their stash name, sorted by filename.
    ///
    /// A delete that crashed or failed to purge leaves one of these behind.
    pub async fn list_stashed(&self) -> Result<Vec<StashedBlob>> {
        let mut stashed = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let original = name
                .strip_prefix('.')
                .and_then(|n| n.strip_suffix(STASH_SUFFIX))
                .filter(|n| !n.is_empty());
            if let Some(original) = original {
                stashed.push(StashedBlob {
                    filename: original.to_string(),
                    path: entry.path(),
                });
            }
        }

        stashed.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(stashed)
    }

    /// List the names of all stored `.apk` blobs, sorted.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') && has_apk_extension(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
