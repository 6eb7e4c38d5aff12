//! Postgres-backed repository implementations.

mod comments;
mod follows;
mod groups;
mod posts;
mod sessions;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::{sync::Arc, time::Duration};

use sqlx::{
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// One pool shared by every repository trait implementation.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a pool. Waiting for a free connection is capped at `ACQUIRE_TIMEOUT`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    /// Apply the embedded schema migrations from `migrations/`.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        MIGRATOR.run(pool).await?;
        info!(
            target = "yatube::db",
            migrations = MIGRATOR.iter().count(),
            "database schema up to date"
        );
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(self.pool()).await?;
        Ok(())
    }
}
