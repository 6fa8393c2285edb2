use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Base path every route is served under.
pub const API_BASE: &str = "/api";

/// The full HTTP surface. CORS and tracing layers are added by the server.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/requests",
            get(handlers::list_requests).post(handlers::create_request),
        )
        .route(
            "/requests/{slug}",
            get(handlers::get_request)
                .patch(handlers::update_request)
                .delete(handlers::delete_request),
        )
        .route("/requests/{slug}/view", post(handlers::record_view))
        .route("/requests/{slug}/help-click", post(handlers::record_help_click))
        .route("/reports", post(handlers::submit_report))
        .route("/health", get(handlers::health))
        .with_state(state);

    Router::new()
        .nest(API_BASE, api)
        .fallback(handlers::not_found)
}
