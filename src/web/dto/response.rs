//! Response DTOs for the APK Depot API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::depot::ListedApk;

/// One entry of `GET /apks`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApkResponse {
    /// Stored filename.
    pub filename: String,
    /// Upload date (ISO-8601, UTC, millisecond precision).
    #[serde(with = "crate::datetime::iso8601")]
    #[schema(value_type = String, format = DateTime)]
    pub upload_date: DateTime<Utc>,
    /// Path the file is served from.
    pub url: String,
}

impl From<ListedApk> for ApkResponse {
    fn from(apk: ListedApk) -> Self {
        Self {
            filename: apk.filename,
            upload_date: apk.upload_date,
            url: apk.url,
        }
    }
}
