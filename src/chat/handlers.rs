use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures_util::{stream, StreamExt};
use tracing::{debug, error, instrument};

use super::{client::TokenStream, dto::ChatRequest, services::compose_transcript};
use crate::{auth::session::AuthUser, error::AppResult, preferences, state::AppState};

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

fn stream_response(tokens: TokenStream) -> Response {
    let body = Body::from_stream(tokens.map(|item| {
        item.inspect_err(|e| error!(error = %e, "completion stream aborted"))
    }));
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response()
}

#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;
    if req.messages.is_empty() {
        debug!("empty transcript; nothing to relay");
        return Ok(stream_response(stream::empty().boxed()));
    }

    let prefs = preferences::services::read(state.preferences.as_ref(), user_id).await?;
    let transcript = compose_transcript(req.messages, prefs.as_ref());
    let tokens = state.completions.stream_chat(transcript).await?;
    Ok(stream_response(tokens))
}
