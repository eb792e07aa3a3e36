//! Filename generation and validation for stored packages.

use chrono::{DateTime, Utc};

use super::{APK_EXTENSION, MAX_FILENAME_LENGTH};
use crate::{DepotError, Result};

/// Generate the stored filename for a new upload.
///
/// The name is `<field_name>-<unix millis>.apk`. Two uploads on the same
/// field within the same millisecond get the same name; the blob store
/// refuses to overwrite in that case.
pub fn generate_filename(field_name: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.{}", field_name, now.timestamp_millis(), APK_EXTENSION)
}

/// Check whether a filename ends with `.apk` (case-insensitive).
pub fn has_apk_extension(filename: &str) -> bool {
    let suffix_len = APK_EXTENSION.len() + 1;
    filename.len() >= suffix_len
        && filename.is_char_boundary(filename.len() - suffix_len)
        && filename[filename.len() - suffix_len..].eq_ignore_ascii_case(".apk")
}

/// Normalize a client-supplied rename target.
///
/// Surrounding whitespace is trimmed and `.apk` is appended unless the name
/// already carries it in any letter case.
pub fn normalize_new_filename(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DepotError::Validation(
            "new filename must not be blank".to_string(),
        ));
    }

    let normalized = if has_apk_extension(trimmed) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.{APK_EXTENSION}")
    };

    validate_filename(&normalized)?;
    Ok(normalized)
}

/// Ensure a filename names a single entry inside the uploads directory.
///
/// Rejects empty names, path separators, `.`/`..`, hidden names (the store
/// uses a leading dot for its own temporary files) and control characters.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(DepotError::Validation("filename must not be empty".to_string()));
    }
    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(DepotError::Validation(format!(
            "filename must be at most {MAX_FILENAME_LENGTH} bytes"
        )));
    }
    if filename.starts_with('.') {
        return Err(DepotError::Validation(
            "filename must not start with '.'".to_string(),
        ));
    }
    if filename.contains(['/', '\\']) {
        return Err(DepotError::Validation(
            "filename must not contain path separators".to_string(),
        ));
    }
    if filename.chars().any(char::is_control) {
        return Err(DepotError::Validation(
            "filename must not contain control characters".to_string(),
        ));
    }
    Ok(())
}
