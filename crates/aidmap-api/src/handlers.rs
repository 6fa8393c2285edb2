use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use aidmap_types::api::{
    CreateHelpRequest, HelpRequest, HelpRequestDetail, OkResponse, SubmitReport,
    UpdateHelpRequest,
};

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub urgency: Option<String>,
}

/// Run blocking store work off the async runtime.
async fn blocking<T, F>(state: AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Store(anyhow::anyhow!("blocking task failed"))
        })?
}

/// GET /requests?urgency=
pub async fn list_requests(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<HelpRequest>>, ApiError> {
    let Query(query) = query?;
    let requests = blocking(state, move |s| s.requests().list(query.urgency.as_deref())).await?;
    Ok(Json(requests))
}

/// POST /requests
pub async fn create_request(
    State(state): State<AppState>,
    body: Result<Json<CreateHelpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    let created = blocking(state, move |s| s.requests().create(input)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /requests/{slug}. Also counts a view.
pub async fn get_request(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<HelpRequestDetail>, ApiError> {
    let detail = blocking(state, move |s| s.requests().get_by_slug(&slug)).await?;
    Ok(Json(detail))
}

/// POST /requests/{slug}/view
pub async fn record_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    blocking(state, move |s| s.requests().record_view(&slug)).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /requests/{slug}/help-click
pub async fn record_help_click(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    blocking(state, move |s| s.requests().record_help_click(&slug)).await?;
    Ok(Json(OkResponse::ok()))
}

/// PATCH /requests/{slug}
pub async fn update_request(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Result<Json<UpdateHelpRequest>, JsonRejection>,
) -> Result<Json<HelpRequest>, ApiError> {
    let Json(input) = body?;
    let updated = blocking(state, move |s| s.requests().update(&slug, input)).await?;
    Ok(Json(updated))
}

/// DELETE /requests/{slug}. Soft delete only.
pub async fn delete_request(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    blocking(state, move |s| s.requests().soft_delete(&slug)).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /reports
pub async fn submit_report(
    State(state): State<AppState>,
    body: Result<Json<SubmitReport>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    blocking(state, move |s| s.reports().submit(input)).await?;
    Ok((StatusCode::CREATED, Json(OkResponse::ok())))
}

/// GET /health
pub async fn health() -> Json<OkResponse> {
    Json(OkResponse::ok())
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found")
}
