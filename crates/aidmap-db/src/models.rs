//! Row types for the SQLite tables. Sensitive columns hold cipher tokens, never
//! plaintext; decryption happens above this crate.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

pub struct HelpRequestRow {
    pub id: String,
    pub slug: String,
    pub urgency: String,
    pub category: String,
    pub description: Option<String>,
    pub lat: f64,
    pub lng: f64,
    /// Cipher token.
    pub contact: String,
    /// Cipher token.
    pub name: Option<String>,
    pub views: i64,
    pub help_clicks: i64,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub request_id: String,
    pub reason: String,
    pub details: Option<String>,
    pub created_at: String,
}

/// Column updates for a help request. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct RequestChanges {
    pub status: Option<String>,
    pub urgency: Option<String>,
    pub category: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    /// Cipher token.
    pub contact: Option<String>,
    /// Cipher token.
    pub name: Option<String>,
}

impl RequestChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.urgency.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.contact.is_none()
            && self.name.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The unique slug index rejected the row.
    SlugTaken,
}

pub enum UpdateOutcome {
    Updated(HelpRequestRow),
    NotFound,
    /// The row is soft-deleted and was left unchanged.
    Deleted,
}

/// Format a timestamp for storage. Fixed-width RFC 3339 in UTC, so lexical
/// order matches chronological order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_db_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') form, no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("invalid timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_roundtrip_and_sort() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 11, 20, 18, 0, 0).unwrap();

        let (a, b) = (to_db_timestamp(&early), to_db_timestamp(&late));
        assert_eq!(a, "2026-03-01T09:05:00.000Z");
        assert!(a < b);
        assert_eq!(from_db_timestamp(&a).unwrap(), early);
    }

    #[test]
    fn accepts_sqlite_datetime_format() {
        let parsed = from_db_timestamp("2026-03-01 09:05:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap());
        assert!(from_db_timestamp("yesterday").is_err());
    }

    #[test]
    fn empty_changes() {
        assert!(RequestChanges::default().is_empty());
        let changes = RequestChanges {
            description: Some(None),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
