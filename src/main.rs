mod app;
mod auth;
mod chat;
mod config;
mod db;
mod error;
mod preferences;
mod state;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_planner=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init()?;

    // Repositories retry on first use, so a cold database does not block startup.
    if let Err(e) = state.db.ensure_connected().await {
        tracing::warn!(error = %e, "database not reachable yet; will retry on demand");
    }

    app::serve(app::build_app(state)).await
}
