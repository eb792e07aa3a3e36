//! Request DTOs for the APK Depot API.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Rename request.
///
/// Missing fields deserialize as empty strings so they are reported by
/// validation, with field details, rather than as a JSON error.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    /// Current stored filename.
    #[serde(default)]
    #[validate(length(min = 1, message = "oldFilename is required"))]
    pub old_filename: String,
    /// Requested new filename; `.apk` is appended when missing.
    #[serde(default)]
    #[validate(length(min = 1, message = "newFilename is required"))]
    pub new_filename: String,
}

/// Delete request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteRequest {
    /// Stored filename to delete.
    #[serde(default)]
    #[validate(length(min = 1, message = "filename is required"))]
    pub filename: String,
}

/// Multipart upload form (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The APK file, sent as `application/vnd.android.package-archive`.
    #[schema(value_type = String, format = Binary)]
    pub apk: Vec<u8>,
}
