use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::auth::Auth;
use crate::state::AppState;
use crate::store::{HistoryView, RoleId, TurnRecord};

use super::store_error_response;

/// Conversation history of the caller with one role, oldest first
///
/// Served from the history view cache; the pipeline invalidates it whenever
/// it writes a turn or a summary for the caller.
pub async fn role_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(role_id): Path<RoleId>,
) -> Response {
    let user_id = auth.user_id;
    let view = HistoryView::Role { user_id, role_id };
    let store = state.store.clone();

    match state
        .history_cache
        .get_or_load(view, || async move { store.list_turns(user_id, Some(role_id)).await })
        .await
    {
        Ok(turns) => {
            debug!(user_id, role_id, count = turns.len(), "History served");
            Json(turns.as_ref().clone()).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// Every turn of the caller across roles, oldest first
pub async fn all_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
) -> Response {
    let user_id = auth.user_id;
    let store = state.store.clone();

    match state
        .history_cache
        .get_or_load(HistoryView::All { user_id }, || async move {
            store.list_turns(user_id, None).await
        })
        .await
    {
        Ok(turns) => Json(turns.as_ref().clone()).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// The latest turn of the caller with each role, newest conversation first
pub async fn recent_messages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
) -> Response {
    let user_id = auth.user_id;
    let store = state.store.clone();

    match state
        .history_cache
        .get_or_load(HistoryView::Recent { user_id }, || async move {
            store.list_turns(user_id, None).await.map(latest_per_role)
        })
        .await
    {
        Ok(turns) => Json(turns.as_ref().clone()).into_response(),
        Err(e) => store_error_response(e),
    }
}

fn latest_per_role(turns: Vec<TurnRecord>) -> Vec<TurnRecord> {
    let mut latest: HashMap<RoleId, TurnRecord> = HashMap::new();
    for turn in turns {
        match latest.get(&turn.role_id) {
            Some(seen) if (seen.created_at, seen.id) >= (turn.created_at, turn.id) => {}
            _ => {
                latest.insert(turn.role_id, turn);
            }
        }
    }

    let mut recent: Vec<TurnRecord> = latest.into_values().collect();
    recent.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    recent
}
