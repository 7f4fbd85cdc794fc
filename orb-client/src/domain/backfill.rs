use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lifecycle status of a provider-side backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackfillStatus {
    Pending,
    PendingRevert,
    Reflected,
    Failed,
    Reverted,
    /// Any status this client does not know about yet.
    Unknown,
}

impl BackfillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingRevert => "pending_revert",
            Self::Reflected => "reflected",
            Self::Failed => "failed",
            Self::Reverted => "reverted",
            Self::Unknown => "unknown",
        }
    }

    /// Still open or still being reverted; blocks new backfills for the customer.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingRevert)
    }
}

impl From<String> for BackfillStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "pending_revert" => Self::PendingRevert,
            "reflected" => Self::Reflected,
            "failed" => Self::Failed,
            "reverted" => Self::Reverted,
            _ => Self::Unknown,
        }
    }
}

impl From<BackfillStatus> for String {
    fn from(s: BackfillStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for BackfillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backfill {
    pub id: String,
    pub status: BackfillStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timeframe_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timeframe_end: Option<OffsetDateTime>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub events_ingested: Option<u64>,
    #[serde(default)]
    pub replace_existing_events: Option<bool>,
}

/// Body of a create-backfill request. Timeframe bounds are sent with
/// millisecond precision, e.g. `2025-01-01T00:00:00.000Z`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateBackfill {
    #[serde(serialize_with = "serialize_timeframe")]
    pub timeframe_start: OffsetDateTime,
    #[serde(serialize_with = "serialize_timeframe")]
    pub timeframe_end: OffsetDateTime,
    pub external_customer_id: String,
    pub replace_existing_events: bool,
}

pub fn format_timeframe(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(time::UtcOffset::UTC);
    utc.format(time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
    .unwrap_or_else(|_| utc.to_string())
}

fn serialize_timeframe<S: serde::Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timeframe(*ts))
}

/// Terminal status requested when closing a backfill early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStatus {
    Failed,
}

#[derive(Debug, Serialize)]
pub(crate) struct CloseRequest {
    pub status: CloseStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination_metadata: PaginationMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationMetadata {
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn status_parses_known_and_unknown_values() {
        let s: BackfillStatus = serde_json::from_str(r#""pending_revert""#).unwrap();
        assert_eq!(s, BackfillStatus::PendingRevert);
        assert!(s.is_in_flight());

        let s: BackfillStatus = serde_json::from_str(r#""archived""#).unwrap();
        assert_eq!(s, BackfillStatus::Unknown);
        assert!(!s.is_in_flight());

        assert_eq!(serde_json::to_string(&BackfillStatus::Reflected).unwrap(), r#""reflected""#);
    }

    #[test]
    fn backfill_page_parses_with_optional_fields_missing() {
        let body = r#"{
            "data": [
                {"id": "bf_1", "status": "pending", "created_at": "2025-01-01T00:00:00+00:00"},
                {"id": "bf_2", "status": "reflected", "events_ingested": 12}
            ],
            "pagination_metadata": {"has_more": true, "next_cursor": "c2"}
        }"#;
        let page: Page<Backfill> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].created_at, Some(datetime!(2025-01-01 00:00:00 UTC)));
        assert_eq!(page.data[1].events_ingested, Some(12));
        assert!(page.pagination_metadata.has_more);
        assert_eq!(page.pagination_metadata.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn create_request_uses_millisecond_timeframes() {
        let req = CreateBackfill {
            timeframe_start: datetime!(2025-01-01 00:00:00 UTC),
            timeframe_end: datetime!(2025-01-04 00:00:00 UTC),
            external_customer_id: "acme".to_string(),
            replace_existing_events: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["timeframe_start"], "2025-01-01T00:00:00.000Z");
        assert_eq!(json["timeframe_end"], "2025-01-04T00:00:00.000Z");
        assert_eq!(json["replace_existing_events"], true);
    }
}
