use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single usage event as accepted by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub external_customer_id: String,
    pub event_name: String,
    #[serde(with = "event_timestamp")]
    pub timestamp: OffsetDateTime,
    pub idempotency_key: String,
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Whole-second UTC timestamps, e.g. `2025-01-01T12:00:00Z`.
pub mod event_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime, UtcOffset};

    pub fn format(ts: OffsetDateTime) -> String {
        let utc = ts.to_offset(UtcOffset::UTC);
        utc.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
            .unwrap_or_else(|_| utc.to_string())
    }

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

/// A single rejected event in an ingest response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub idempotency_key: String,
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub validation_failed: Vec<ValidationFailure>,
    #[serde(default)]
    pub debug: Option<serde_json::Value>,
}

impl IngestResponse {
    pub fn is_clean(&self) -> bool {
        self.validation_failed.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct IngestRequest<'a> {
    pub events: &'a [Event],
}
