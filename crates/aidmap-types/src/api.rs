use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use uuid::Uuid;

use crate::models::{Category, ReportReason, Status, Urgency};

// -- Help requests --

/// Body of `POST /requests`. Every field is optional at the type level so the
/// service can report all missing fields as one validation error.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpRequest {
    pub urgency: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "coordinate")]
    pub lng: Option<f64>,
    pub contact: Option<String>,
    pub name: Option<String>,
}

/// Body of `PATCH /requests/{slug}`. Absent fields are left untouched.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHelpRequest {
    pub status: Option<String>,
    pub urgency: Option<String>,
    pub category: Option<String>,
    /// `None` = not sent, `Some(None)` = sent as null, `Some(Some(_))` = sent.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub contact: Option<String>,
    pub name: Option<String>,
}

/// A help request as served to callers, with sensitive fields decrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: Uuid,
    pub slug: String,
    pub urgency: Urgency,
    pub category: Category,
    pub description: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub contact: Option<String>,
    pub name: Option<String>,
    pub views: u64,
    pub help_clicks: u64,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Response of `GET /requests/{slug}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestDetail {
    #[serde(flatten)]
    pub request: HelpRequest,
    pub reports: Vec<Report>,
}

// -- Reports --

/// Body of `POST /reports`. `request_id` carries the public slug.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReport {
    pub request_id: Option<String>,
    pub reason: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub request_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Generic bodies --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Deserialization helpers --

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(f64),
    Text(String),
}

/// Accepts a coordinate as a JSON number or a numeric string.
fn coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<RawCoordinate>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawCoordinate::Number(n)) => n,
        Some(RawCoordinate::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(RawCoordinate::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid coordinate '{}'", s)))?,
    };

    if !value.is_finite() {
        return Err(de::Error::custom("coordinate must be finite"));
    }
    Ok(Some(value))
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
