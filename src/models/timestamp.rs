//! Backend timestamp codec.
//!
//! The backend emits ISO-8601 local date-times without an offset
//! (`2024-03-05T14:22:01.123`), dropping the seconds when they are zero
//! (`2024-03-05T14:22`). Older records use `2024-03-05 14:22:01`.
//! All values are treated as UTC. Anything unparsable becomes "now" so a
//! single malformed record never breaks a list.
//!
//! Use as `#[serde(with = "crate::models::timestamp")]`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const ISO_LOCAL: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_LOCAL_MINUTES: &str = "%Y-%m-%dT%H:%M";
const LEGACY: &str = "%Y-%m-%d %H:%M:%S";
const ISO_LOCAL_OUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Try each known format in order. `None` if none match.
pub fn try_parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, ISO_LOCAL)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, ISO_LOCAL_MINUTES))
    {
        return Some(naive.and_utc());
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, LEGACY) {
        return Some(naive.and_utc());
    }
    None
}

pub fn parse_lenient(raw: &str) -> DateTime<Utc> {
    try_parse(raw).unwrap_or_else(|| {
        tracing::warn!(raw, "unparsable timestamp, defaulting to now");
        Utc::now()
    })
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(ISO_LOCAL_OUT).to_string()
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(parse_lenient).unwrap_or_else(Utc::now))
}
