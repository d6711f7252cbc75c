use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
    jwt::JwtKeys,
    services::{authenticate, issue_tokens, register},
    session::{clear_session_cookie, session_cookie, AuthUser},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
        .route("/logout", post(logout_handler))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// Token pair in the body plus the access token as the session cookie.
fn session_response(status: StatusCode, keys: &JwtKeys, body: AuthResponse) -> Response {
    let cookie = session_cookie(&body.access_token, keys.access_ttl, keys.cookie_secure);
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

#[instrument(skip(state, payload))]
pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let user = register(state.users.as_ref(), payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, user)?;
    Ok(session_response(StatusCode::CREATED, &keys, body))
}

#[instrument(skip(state, payload))]
pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let user = authenticate(state.users.as_ref(), &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, user)?;
    Ok(session_response(StatusCode::OK, &keys, body))
}

#[instrument(skip(state, payload))]
pub async fn refresh_handler(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let body = issue_tokens(&keys, user)?;
    Ok(session_response(StatusCode::OK, &keys, body))
}

pub async fn logout_handler(State(state): State<AppState>) -> impl IntoResponse {
    let secure = state.config.jwt.cookie_secure;
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(secure))],
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(PublicUser::from(user)))
}
