pub mod admin;
pub mod attendance;
pub mod guest;
pub mod invite;
pub mod item_type;
pub mod party;
pub mod selection;
pub mod snapshot;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Format used for every timestamp the service stores. Matches the SQLite
/// default `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so stored values compare
/// correctly as strings.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a client-supplied RFC 3339 timestamp and normalize it to UTC.
pub fn normalize_timestamp(field: &str, raw: &str) -> Result<String, AppError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| format_timestamp(ts.with_timezone(&Utc)))
        .map_err(|_| AppError::BadRequest(format!("{field} must be an RFC 3339 timestamp")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Treat blank optional strings as absent.
pub fn trim_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Distinguishes a missing field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies. Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
