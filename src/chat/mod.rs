use crate::state::AppState;
use axum::Router;

pub mod client;
pub mod dto;
pub mod handlers;
pub mod services;
mod sse;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::chat_routes())
}
