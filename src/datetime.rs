//! Date/time utilities for APK Depot.
//!
//! Upload dates are persisted as ISO-8601 UTC strings with millisecond
//! precision (e.g. `2024-01-15T10:30:00.123Z`).

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC datetime as an ISO-8601 string with millisecond precision.
pub fn to_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC3339/ISO-8601 string into a UTC datetime.
///
/// Returns `None` if the string is not a valid timestamp.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for `DateTime<Utc>` fields stored as ISO-8601 strings.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_iso8601(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_iso8601(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 timestamp: {s}")))
    }
}
