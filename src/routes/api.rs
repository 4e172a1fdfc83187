use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{history, roles};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Authentication middleware is applied by [`super::app`] once state exists.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(history::all_history))
        .route("/history/recent", get(history::recent_messages))
        .route("/history/{role_id}", get(history::role_history))
        .route(
            "/roles/{role_id}",
            get(roles::get_role).patch(roles::update_role),
        )
        .layer(TraceLayer::new_for_http())
}

/// Routes that need no authentication
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(crate::handlers::api::health_check))
        .route("/voices", get(crate::handlers::voices::list_voices))
        .layer(TraceLayer::new_for_http())
}
