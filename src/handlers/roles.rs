use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::auth::Auth;
use crate::state::AppState;
use crate::store::{RoleId, RoleUpdate};

use super::store_error_response;

pub async fn get_role(State(state): State<Arc<AppState>>, Path(role_id): Path<RoleId>) -> Response {
    match state.store.role(role_id).await {
        Ok(Some(role)) => Json(role).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Role {role_id} not found")})),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Apply a partial update to a role
///
/// Only the fields of [`RoleUpdate`] are accepted; unknown keys are rejected
/// while the body is parsed and field values are checked by the store.
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(role_id): Path<RoleId>,
    Json(update): Json<RoleUpdate>,
) -> Response {
    match state.store.update_role(role_id, &update).await {
        Ok(role) => {
            info!(user_id = auth.user_id, role_id, "Role updated");
            Json(role).into_response()
        }
        Err(e) => store_error_response(e),
    }
}
