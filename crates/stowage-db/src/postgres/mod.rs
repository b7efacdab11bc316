//! PostgreSQL repositories

mod file_info;
mod upload_session;

pub use file_info::PgFileInfoRepository;
pub use upload_session::PgUploadSessionRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use stowage_core::AppError;

const MAX_CONNECTIONS: u32 = 20;

/// Open a pool and apply the bundled migrations.
pub async fn connect(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database connected and migrations applied");
    Ok(pool)
}
