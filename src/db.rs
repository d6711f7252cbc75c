use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Process-wide database handle.
///
/// The pool connects lazily; `ensure_connected` pings the server and applies
/// migrations exactly once. A failed attempt leaves the cell empty so the next
/// caller retries.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    ready: Arc<OnceCell<()>>,
}

impl Database {
    pub fn new(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
            .connect_lazy(&cfg.url)
            .context("parse DATABASE_URL")?;
        Ok(Self {
            pool,
            ready: Arc::new(OnceCell::new()),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub async fn ensure_connected(&self) -> Result<(), sqlx::Error> {
        self.ready
            .get_or_try_init(|| async {
                sqlx::query("SELECT 1").execute(&self.pool).await?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&self.pool).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("database connected");
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map(|_| ())
    }
}
