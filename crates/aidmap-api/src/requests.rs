use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use aidmap_crypto::FieldCipher;
use aidmap_crypto::slug::{new_slug, redact};
use aidmap_db::Database;
use aidmap_db::models::{
    HelpRequestRow, InsertOutcome, ReportRow, RequestChanges, UpdateOutcome, from_db_timestamp,
    to_db_timestamp,
};
use aidmap_types::api::{
    CreateHelpRequest, HelpRequest, HelpRequestDetail, Report, UpdateHelpRequest,
};
use aidmap_types::{Category, ReportReason, Status, Urgency};

use crate::error::ApiError;

/// Lifetime recorded in `expires_at`. Advisory unless the expiry sweep is enabled.
pub const REQUEST_TTL_DAYS: i64 = 14;

/// A slug collision gets one fresh slug before create gives up.
const CREATE_ATTEMPTS: usize = 2;

/// Lifecycle rules for help requests: creation, listing, lookup by slug,
/// counters, partial updates and soft delete.
pub struct RequestService<'a> {
    db: &'a Database,
    cipher: &'a FieldCipher,
    slug_source: fn() -> String,
}

impl<'a> RequestService<'a> {
    pub fn new(db: &'a Database, cipher: &'a FieldCipher) -> Self {
        Self::with_slug_source(db, cipher, new_slug)
    }

    /// Like [`new`](Self::new), but slugs for `create` come from `slug_source`.
    pub fn with_slug_source(
        db: &'a Database,
        cipher: &'a FieldCipher,
        slug_source: fn() -> String,
    ) -> Self {
        Self {
            db,
            cipher,
            slug_source,
        }
    }

    /// Pending requests, newest first. An unrecognized urgency filter is ignored.
    pub fn list(&self, urgency: Option<&str>) -> Result<Vec<HelpRequest>, ApiError> {
        let filter = urgency.and_then(Urgency::known);
        let rows = self.db.list_pending(filter.as_ref().map(Urgency::as_str))?;
        rows.into_iter().map(|row| self.to_response(row)).collect()
    }

    pub fn create(&self, input: CreateHelpRequest) -> Result<HelpRequest, ApiError> {
        let (Some(urgency), Some(category), Some(lat), Some(lng), Some(contact)) = (
            non_empty(input.urgency),
            non_empty(input.category),
            input.lat,
            input.lng,
            non_empty(input.contact),
        ) else {
            return Err(ApiError::Validation("Missing required fields".into()));
        };

        let created_at = Utc::now();
        let expires_at = created_at + Duration::days(REQUEST_TTL_DAYS);

        let mut row = HelpRequestRow {
            id: Uuid::new_v4().to_string(),
            slug: String::new(),
            urgency: Urgency::normalize(&urgency).into(),
            category: Category::normalize(&category).into(),
            description: input.description.filter(|d| !d.is_empty()),
            lat,
            lng,
            contact: self.cipher.encrypt(&contact)?,
            name: self.cipher.encrypt_opt(non_empty(input.name).as_deref())?,
            views: 0,
            help_clicks: 0,
            status: Status::Pending.as_str().to_string(),
            created_at: to_db_timestamp(&created_at),
            expires_at: to_db_timestamp(&expires_at),
        };

        for attempt in 1..=CREATE_ATTEMPTS {
            row.slug = (self.slug_source)();
            match self.db.insert_help_request(&row)? {
                InsertOutcome::Inserted => {
                    info!(
                        "Help request {} created ({}, {})",
                        redact(&row.slug),
                        row.urgency,
                        row.category
                    );
                    return self.to_response(row);
                }
                InsertOutcome::SlugTaken => {
                    warn!("Slug collision on create (attempt {})", attempt);
                }
            }
        }

        Err(ApiError::Store(anyhow!(
            "no unique slug after {} attempts",
            CREATE_ATTEMPTS
        )))
    }

    /// The request and its reports, without touching any counter.
    pub fn fetch(&self, slug: &str) -> Result<HelpRequestDetail, ApiError> {
        let row = self
            .db
            .get_help_request(slug)?
            .ok_or(ApiError::NotFound("Not found"))?;

        let reports = self
            .db
            .get_reports_for_request(&row.id)?
            .into_iter()
            .map(report_from_row)
            .collect();

        Ok(HelpRequestDetail {
            request: self.to_response(row)?,
            reports,
        })
    }

    /// [`fetch`](Self::fetch) plus a view. The view is counted separately from
    /// the read: if counting fails the read is still returned, unchanged.
    pub fn get_by_slug(&self, slug: &str) -> Result<HelpRequestDetail, ApiError> {
        let mut detail = self.fetch(slug)?;

        match self.record_view(slug) {
            Ok(()) => detail.request.views += 1,
            Err(e) => warn!("Failed to count view for {}: {}", redact(slug), e),
        }

        Ok(detail)
    }

    pub fn record_view(&self, slug: &str) -> Result<(), ApiError> {
        if self.db.increment_views(slug)? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Not found"))
        }
    }

    pub fn record_help_click(&self, slug: &str) -> Result<(), ApiError> {
        if self.db.increment_help_clicks(slug)? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Not found"))
        }
    }

    /// Partial update. Blank strings count as "not provided", except for
    /// `description`, where `""` or `null` clears it and any other text
    /// (whitespace included) is stored as sent. Deleted requests are never
    /// modified.
    pub fn update(&self, slug: &str, input: UpdateHelpRequest) -> Result<HelpRequest, ApiError> {
        let status = non_empty(input.status)
            .map(|raw| raw.parse::<Status>())
            .transpose()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        let changes = RequestChanges {
            status: status.map(|s| s.as_str().to_string()),
            urgency: non_empty(input.urgency).map(|u| Urgency::normalize(&u).into()),
            category: non_empty(input.category).map(|c| Category::normalize(&c).into()),
            description: input.description.map(|d| d.filter(|d| !d.is_empty())),
            contact: self.cipher.encrypt_opt(non_empty(input.contact).as_deref())?,
            name: self.cipher.encrypt_opt(non_empty(input.name).as_deref())?,
        };

        match self.db.update_help_request(slug, &changes)? {
            UpdateOutcome::Updated(row) => {
                if status.is_some_and(Status::is_terminal) {
                    info!("Help request {} deleted via update", redact(slug));
                } else {
                    info!("Help request {} updated", redact(slug));
                }
                self.to_response(row)
            }
            UpdateOutcome::NotFound => Err(ApiError::NotFound("Not found")),
            UpdateOutcome::Deleted => Err(ApiError::Deleted),
        }
    }

    /// Mark the request deleted. Deleting twice is not an error.
    pub fn soft_delete(&self, slug: &str) -> Result<(), ApiError> {
        if !self.db.soft_delete_help_request(slug)? {
            return Err(ApiError::NotFound("Not found"));
        }
        info!("Help request {} soft-deleted", redact(slug));
        Ok(())
    }

    fn to_response(&self, row: HelpRequestRow) -> Result<HelpRequest, ApiError> {
        let contact = self.cipher.decrypt(Some(&row.contact))?;
        let name = self.cipher.decrypt(row.name.as_deref())?;

        let status = row.status.parse::<Status>().unwrap_or_else(|e| {
            warn!("Corrupt status on request '{}': {}", row.id, e);
            Status::default()
        });

        Ok(HelpRequest {
            id: parse_id(&row.id),
            urgency: Urgency::from(row.urgency),
            category: Category::from(row.category),
            description: row.description,
            lat: row.lat,
            lng: row.lng,
            contact,
            name,
            views: u64::try_from(row.views).unwrap_or_default(),
            help_clicks: u64::try_from(row.help_clicks).unwrap_or_default(),
            status,
            created_at: parse_timestamp(&row.created_at, &row.id),
            expires_at: parse_timestamp(&row.expires_at, &row.id),
            slug: row.slug,
        })
    }
}

fn report_from_row(row: ReportRow) -> Report {
    Report {
        id: parse_id(&row.id),
        request_id: parse_id(&row.request_id),
        reason: ReportReason::from(row.reason),
        details: row.details,
        created_at: parse_timestamp(&row.created_at, &row.id),
    }
}

/// Treat blank strings the same as a missing field.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, id: &str) -> DateTime<Utc> {
    from_db_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt timestamp on '{}': {}", id, e);
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use aidmap_crypto::keys::generate_key;

    use super::*;

    fn setup() -> (Database, FieldCipher) {
        (
            Database::open_in_memory().unwrap(),
            FieldCipher::new(generate_key()),
        )
    }

    fn input(urgency: &str) -> CreateHelpRequest {
        CreateHelpRequest {
            urgency: Some(urgency.into()),
            category: Some("food".into()),
            description: None,
            lat: Some(38.7),
            lng: Some(-9.1),
            contact: Some("+351911111111".into()),
            name: Some("Ana".into()),
        }
    }

    #[test]
    fn create_returns_plaintext_and_stores_ciphertext() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);

        let created = service.create(input("urgent")).unwrap();
        assert_eq!(created.slug.len(), 10);
        assert_eq!(created.status, Status::Pending);
        assert_eq!(created.views, 0);
        assert_eq!(created.help_clicks, 0);
        assert_eq!(created.contact.as_deref(), Some("+351911111111"));
        assert_eq!(created.name.as_deref(), Some("Ana"));
        assert_eq!(created.expires_at - created.created_at, Duration::days(14));

        let stored = db.get_help_request(&created.slug).unwrap().unwrap();
        assert!(!stored.contact.contains("351911111111"));
        assert_ne!(stored.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn create_requires_core_fields() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);

        let mut missing_contact = input("urgent");
        missing_contact.contact = Some("   ".into());
        assert!(matches!(service.create(missing_contact), Err(ApiError::Validation(_))));

        let mut missing_lat = input("urgent");
        missing_lat.lat = None;
        assert!(matches!(service.create(missing_lat), Err(ApiError::Validation(_))));

        assert!(matches!(
            service.create(CreateHelpRequest::default()),
            Err(ApiError::Validation(_))
        ));
        assert!(db.list_pending(None).unwrap().is_empty());
    }

    #[test]
    fn create_accepts_zero_coordinates_and_unknown_vocabulary() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);

        let mut unusual = input("Critico");
        unusual.category = Some("boats".into());
        unusual.lat = Some(0.0);
        unusual.lng = Some(0.0);
        unusual.name = None;

        let created = service.create(unusual).unwrap();
        assert_eq!(created.urgency.as_str(), "Critico");
        assert_eq!(created.category.as_str(), "boats");
        assert_eq!(created.lat, 0.0);
        assert_eq!(created.name, None);
    }

    const TAKEN: &str = "taken00000";

    thread_local! {
        static SCRIPTED_SLUGS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    }

    fn taken_slug() -> String {
        TAKEN.to_string()
    }

    fn scripted_slug() -> String {
        SCRIPTED_SLUGS.with(|slugs| slugs.borrow_mut().remove(0).to_string())
    }

    #[test]
    fn slug_collision_is_retried_once() {
        let (db, cipher) = setup();
        RequestService::with_slug_source(&db, &cipher, taken_slug)
            .create(input("urgent"))
            .unwrap();

        SCRIPTED_SLUGS.with(|slugs| *slugs.borrow_mut() = vec![TAKEN, "fresh00000"]);
        let created = RequestService::with_slug_source(&db, &cipher, scripted_slug)
            .create(input("critical"))
            .unwrap();

        assert_eq!(created.slug, "fresh00000");
        assert_eq!(created.urgency, Urgency::Critical);
        assert!(SCRIPTED_SLUGS.with(|slugs| slugs.borrow().is_empty()));
        assert_eq!(db.list_pending(None).unwrap().len(), 2);
    }

    #[test]
    fn second_slug_collision_fails_the_create() {
        let (db, cipher) = setup();
        let service = RequestService::with_slug_source(&db, &cipher, taken_slug);
        service.create(input("urgent")).unwrap();

        assert!(matches!(service.create(input("critical")), Err(ApiError::Store(_))));

        let pending = db.list_pending(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].urgency, "urgent");
    }

    #[test]
    fn slugs_are_unique_across_creations() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);

        let slugs: HashSet<String> = (0..300)
            .map(|_| service.create(input("standard")).unwrap().slug)
            .collect();
        assert_eq!(slugs.len(), 300);
    }

    #[test]
    fn get_by_slug_counts_views_and_roundtrips_contact() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let created = service.create(input("urgent")).unwrap();

        let first = service.get_by_slug(&created.slug).unwrap();
        assert_eq!(first.request.views, 1);
        assert_eq!(first.request.contact.as_deref(), Some("+351911111111"));
        assert_eq!(first.request.name.as_deref(), Some("Ana"));

        let second = service.get_by_slug(&created.slug).unwrap();
        assert_eq!(second.request.views, 2);

        assert_eq!(service.fetch(&created.slug).unwrap().request.views, 2);
        assert!(matches!(service.get_by_slug("nope000000"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn failed_view_count_still_returns_the_request() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        db.with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER freeze_views BEFORE UPDATE OF views ON help_requests
                 BEGIN SELECT RAISE(ABORT, 'views are frozen'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let detail = service.get_by_slug(&slug).unwrap();
        assert_eq!(detail.request.views, 0);
        assert_eq!(detail.request.contact.as_deref(), Some("+351911111111"));
        assert_eq!(db.get_help_request(&slug).unwrap().unwrap().views, 0);

        service.record_help_click(&slug).unwrap();
        assert_eq!(service.fetch(&slug).unwrap().request.help_clicks, 1);
    }

    #[test]
    fn counters_only_grow() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        service.record_view(&slug).unwrap();
        service.record_help_click(&slug).unwrap();
        service.record_help_click(&slug).unwrap();

        let detail = service.fetch(&slug).unwrap();
        assert_eq!(detail.request.views, 1);
        assert_eq!(detail.request.help_clicks, 2);

        assert!(matches!(service.record_view("nope000000"), Err(ApiError::NotFound(_))));
        assert!(matches!(service.record_help_click("nope000000"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn list_shows_only_pending_and_honours_known_filters() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);

        let urgent = service.create(input("urgent")).unwrap();
        service.create(input("critical")).unwrap();
        let helped = service.create(input("urgent")).unwrap();
        let deleted = service.create(input("urgent")).unwrap();

        service
            .update(
                &helped.slug,
                UpdateHelpRequest {
                    status: Some("helped".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        service.soft_delete(&deleted.slug).unwrap();

        let all = service.list(None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.status == Status::Pending));
        assert!(all.iter().all(|r| r.contact.as_deref() == Some("+351911111111")));

        let filtered = service.list(Some("urgent")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].slug, urgent.slug);

        assert_eq!(service.list(Some("not-a-real-value")).unwrap().len(), all.len());
        assert_eq!(db.get_help_request(&urgent.slug).unwrap().unwrap().views, 0);
    }

    #[test]
    fn update_is_partial() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let mut with_description = input("urgent");
        with_description.description = Some("need water".into());
        let slug = service.create(with_description).unwrap().slug;

        let updated = service
            .update(
                &slug,
                UpdateHelpRequest {
                    urgency: Some("recovery".into()),
                    contact: Some("+351922222222".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.urgency, Urgency::Recovery);
        assert_eq!(updated.contact.as_deref(), Some("+351922222222"));
        assert_eq!(updated.description.as_deref(), Some("need water"));
        assert_eq!(updated.name.as_deref(), Some("Ana"));

        let cleared = service
            .update(
                &slug,
                UpdateHelpRequest {
                    description: Some(Some(String::new())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.urgency, Urgency::Recovery);

        let spaced = service
            .update(
                &slug,
                UpdateHelpRequest {
                    description: Some(Some("  ".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(spaced.description.as_deref(), Some("  "));

        let nulled = service
            .update(
                &slug,
                UpdateHelpRequest {
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(nulled.description, None);
    }

    #[test]
    fn update_rejects_unknown_status_and_missing_slug() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        let bad = UpdateHelpRequest {
            status: Some("archived".into()),
            ..Default::default()
        };
        assert!(matches!(service.update(&slug, bad), Err(ApiError::Validation(_))));
        assert!(matches!(
            service.update("nope000000", UpdateHelpRequest::default()),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn soft_delete_is_idempotent_and_terminal() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        service.soft_delete(&slug).unwrap();
        service.soft_delete(&slug).unwrap();

        let revive = UpdateHelpRequest {
            status: Some("pending".into()),
            description: Some(Some("x".into())),
            ..Default::default()
        };
        assert!(matches!(service.update(&slug, revive), Err(ApiError::Deleted)));

        let detail = service.fetch(&slug).unwrap();
        assert_eq!(detail.request.status, Status::Deleted);
        assert_eq!(detail.request.description, None);

        assert!(matches!(service.soft_delete("nope000000"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn tampered_contact_fails_the_read() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        let stored = db.get_help_request(&slug).unwrap().unwrap();
        let parts: Vec<&str> = stored.contact.split(':').collect();
        let forged = format!("{}:{}:{}", parts[0], "00".repeat(16), parts[2]);
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE help_requests SET contact = ?1 WHERE slug = ?2",
                [&forged, &slug],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(service.fetch(&slug), Err(ApiError::Tampered)));
    }

    #[test]
    fn malformed_legacy_name_reads_as_none() {
        let (db, cipher) = setup();
        let service = RequestService::new(&db, &cipher);
        let slug = service.create(input("urgent")).unwrap().slug;

        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE help_requests SET name = 'legacy-plain' WHERE slug = ?1",
                [&slug],
            )?;
            Ok(())
        })
        .unwrap();

        let detail = service.fetch(&slug).unwrap();
        assert_eq!(detail.request.name, None);
        assert_eq!(detail.request.contact.as_deref(), Some("+351911111111"));
    }
}
