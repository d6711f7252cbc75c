use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{parse_user_id, PreferencesQuery, SavePreferencesRequest, SaveResponse},
    repo::SaveOutcome,
    services,
};
use crate::{
    auth::session::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn preferences_routes() -> Router<AppState> {
    Router::new().route("/preferences", get(get_preferences).post(save_preferences))
}

/// A session may only read and write its own preferences.
fn ensure_owner(session_user: Uuid, requested: Uuid) -> AppResult<()> {
    if session_user != requested {
        warn!(%session_user, %requested, "preferences access for another user");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, query))]
pub async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(session_user): AuthUser,
    query: Result<Query<PreferencesQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let user_id = parse_user_id(query.user_id.as_deref())?;
    ensure_owner(session_user, user_id)?;

    let body = match services::read(state.preferences.as_ref(), user_id).await? {
        Some(prefs) => serde_json::to_value(prefs).map_err(anyhow::Error::from)?,
        None => json!({}),
    };
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn save_preferences(
    State(state): State<AppState>,
    AuthUser(session_user): AuthUser,
    payload: Result<Json<SavePreferencesRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SaveResponse>)> {
    let Json(payload) = payload?;
    let user_id = parse_user_id(payload.user_id.as_deref())?;
    ensure_owner(session_user, user_id)?;

    let outcome = services::upsert(state.preferences.as_ref(), user_id, payload.patch).await?;
    let status = match outcome {
        SaveOutcome::Created => StatusCode::CREATED,
        SaveOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(SaveResponse::from(outcome))))
}
