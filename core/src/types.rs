//! Value types shared by several resources.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

/// Hypermedia link attached to API resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub method: String,
    #[serde(rename = "targetSchema")]
    pub target_schema: String,
    pub schema: String,
}

/// Timestamp as the API reports it; blank or absent values become `None`.
pub type Timestamp = Option<DateTime<FixedOffset>>;

/// Deserialize an RFC 3339 timestamp, mapping `null` and `""` to `None`.
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
