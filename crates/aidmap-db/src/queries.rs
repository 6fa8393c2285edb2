use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::Database;
use crate::models::{
    HelpRequestRow, InsertOutcome, ReportRow, RequestChanges, UpdateOutcome, to_db_timestamp,
};

const REQUEST_COLUMNS: &str = "id, slug, urgency, category, description, lat, lng, contact, name, \
     views, help_clicks, status, created_at, expires_at";

impl Database {
    // -- Help requests --

    /// Insert a new request. A slug collision is reported as
    /// [`InsertOutcome::SlugTaken`] rather than an error so the caller can retry.
    pub fn insert_help_request(&self, row: &HelpRequestRow) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            let result = conn.execute(
                "INSERT INTO help_requests
                    (id, slug, urgency, category, description, lat, lng, contact, name,
                     views, help_clicks, status, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    row.id,
                    row.slug,
                    row.urgency,
                    row.category,
                    row.description,
                    row.lat,
                    row.lng,
                    row.contact,
                    row.name,
                    row.views,
                    row.help_clicks,
                    row.status,
                    row.created_at,
                    row.expires_at,
                ],
            );

            match result {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(InsertOutcome::SlugTaken)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_help_request(&self, slug: &str) -> Result<Option<HelpRequestRow>> {
        self.with_conn(|conn| query_request_by_slug(conn, slug))
    }

    /// Pending requests, newest first, optionally narrowed to one urgency.
    pub fn list_pending(&self, urgency: Option<&str>) -> Result<Vec<HelpRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REQUEST_COLUMNS} FROM help_requests
                 WHERE status = 'pending' AND (?1 IS NULL OR urgency = ?1)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([urgency], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Atomically add one to `views`. Returns false if the slug is unknown.
    pub fn increment_views(&self, slug: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET views = views + 1 WHERE slug = ?1",
                [slug],
            )?;
            Ok(changed > 0)
        })
    }

    /// Atomically add one to `help_clicks`. Returns false if the slug is unknown.
    pub fn increment_help_clicks(&self, slug: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET help_clicks = help_clicks + 1 WHERE slug = ?1",
                [slug],
            )?;
            Ok(changed > 0)
        })
    }

    /// Apply `changes` unless the request is soft-deleted. The status check and
    /// the write happen under the same writer lock.
    pub fn update_help_request(&self, slug: &str, changes: &RequestChanges) -> Result<UpdateOutcome> {
        self.with_conn_mut(|conn| {
            let Some(current) = query_request_by_slug(conn, slug)? else {
                return Ok(UpdateOutcome::NotFound);
            };
            if current.status == "deleted" {
                return Ok(UpdateOutcome::Deleted);
            }
            if changes.is_empty() {
                return Ok(UpdateOutcome::Updated(current));
            }

            let mut sets: Vec<&str> = Vec::new();
            let mut params: Vec<&dyn ToSql> = Vec::new();

            if let Some(status) = &changes.status {
                sets.push("status = ?");
                params.push(status);
            }
            if let Some(urgency) = &changes.urgency {
                sets.push("urgency = ?");
                params.push(urgency);
            }
            if let Some(category) = &changes.category {
                sets.push("category = ?");
                params.push(category);
            }
            if let Some(description) = &changes.description {
                sets.push("description = ?");
                params.push(description);
            }
            if let Some(contact) = &changes.contact {
                sets.push("contact = ?");
                params.push(contact);
            }
            if let Some(name) = &changes.name {
                sets.push("name = ?");
                params.push(name);
            }

            let sql = format!(
                "UPDATE help_requests SET {} WHERE id = ?",
                sets.join(", ")
            );
            params.push(&current.id);
            conn.execute(&sql, params.as_slice())?;

            let updated = query_request_by_slug(conn, slug)?
                .ok_or_else(|| anyhow!("Help request vanished during update"))?;
            Ok(UpdateOutcome::Updated(updated))
        })
    }

    /// Mark a request deleted. Idempotent; returns false if the slug is unknown.
    pub fn soft_delete_help_request(&self, slug: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET status = 'deleted' WHERE slug = ?1",
                [slug],
            )?;
            Ok(changed > 0)
        })
    }

    /// Soft-delete every live request whose `expires_at` is before `now`.
    pub fn expire_help_requests(&self, now: &DateTime<Utc>) -> Result<usize> {
        let cutoff = to_db_timestamp(now);
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET status = 'deleted'
                 WHERE status != 'deleted' AND expires_at < ?1",
                [&cutoff],
            )?;
            Ok(changed)
        })
    }

    /// Internal id for a slug, regardless of status.
    pub fn get_request_id(&self, slug: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM help_requests WHERE slug = ?1",
                [slug],
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Reports --

    pub fn insert_report(&self, row: &ReportRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, request_id, reason, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![row.id, row.request_id, row.reason, row.details, row.created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_reports_for_request(&self, request_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, request_id, reason, details, created_at
                 FROM reports
                 WHERE request_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([request_id], |row| {
                    Ok(ReportRow {
                        id: row.get(0)?,
                        request_id: row.get(1)?,
                        reason: row.get(2)?,
                        details: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_request_by_slug(conn: &Connection, slug: &str) -> Result<Option<HelpRequestRow>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM help_requests WHERE slug = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([slug], request_from_row).optional()
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<HelpRequestRow> {
    Ok(HelpRequestRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        urgency: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        lat: row.get(5)?,
        lng: row.get(6)?,
        contact: row.get(7)?,
        name: row.get(8)?,
        views: row.get(9)?,
        help_clicks: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
        expires_at: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
