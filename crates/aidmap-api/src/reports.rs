use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use aidmap_crypto::slug::redact;
use aidmap_db::Database;
use aidmap_db::models::{ReportRow, to_db_timestamp};
use aidmap_types::ReportReason;
use aidmap_types::api::SubmitReport;

use crate::error::ApiError;
use crate::requests::non_empty;

/// Records moderation reports against help requests.
pub struct ReportService<'a> {
    db: &'a Database,
}

impl<'a> ReportService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// File a report against the request whose slug is `input.request_id`.
    /// Soft-deleted requests can still be reported; unknown slugs cannot.
    pub fn submit(&self, input: SubmitReport) -> Result<(), ApiError> {
        let (Some(slug), Some(reason)) = (non_empty(input.request_id), non_empty(input.reason))
        else {
            return Err(ApiError::Validation("Missing requestId or reason".into()));
        };

        let request_id = self
            .db
            .get_request_id(&slug)?
            .ok_or(ApiError::NotFound("Request not found"))?;

        let row = ReportRow {
            id: Uuid::new_v4().to_string(),
            request_id,
            reason: ReportReason::normalize(&reason).into(),
            details: non_empty(input.details),
            created_at: to_db_timestamp(&Utc::now()),
        };
        self.db.insert_report(&row)?;

        info!("Report filed against {} ({})", redact(&slug), row.reason);
        Ok(())
    }
}
