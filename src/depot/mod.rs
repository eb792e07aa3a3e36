//! APK depot: the blob directory, the metadata document and the layer that
//! keeps them in agreement.
//!
//! This module provides:
//! - Timestamp-based filename generation and rename normalization
//! - Streaming blob storage on the local filesystem
//! - A JSON metadata store behind the [`MetadataStore`] capability trait
//! - Per-filename locking for mutating operations
//! - The [`Depot`] service combining all of the above

mod locks;
mod metadata;
mod naming;
mod service;
mod storage;

pub use locks::{FileLockGuard, FileLocks};
pub use metadata::{JsonMetadataStore, MetadataEntry, MetadataStore};
pub use naming::{generate_filename, has_apk_extension, normalize_new_filename, validate_filename};
pub use service::{
    retrieval_url, AuditReport, DeleteOutcome, Depot, ListedApk, StashRecovery, UploadOutcome,
    UploadPolicy,
};
pub use storage::{BlobStore, StashedBlob};

/// File extension of stored packages (without the dot).
pub const APK_EXTENSION: &str = "apk";

/// Media type of Android packages.
pub const APK_MEDIA_TYPE: &str = "application/vnd.android.package-archive";

/// URL prefix under which stored blobs are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Suffix of blobs moved aside while a delete is in flight.
pub const STASH_SUFFIX: &str = ".deleting";

/// Longest file name most filesystems accept (in bytes).
const NAME_MAX: usize = 255;

/// Maximum length for a stored filename (in bytes).
///
/// Leaves room for the leading dot and [`STASH_SUFFIX`] of the stash name.
pub const MAX_FILENAME_LENGTH: usize = NAME_MAX - 1 - STASH_SUFFIX.len();
