//! Upload session repository: CRUD for the upload_sessions table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use stowage_core::{AppError, AppResult, UploadSession, UploadType};
use uuid::Uuid;

use crate::traits::UploadSessionStore;

const SESSION_COLUMNS: &str =
    "id, upload_type, user_id, file_name, file_size, file_offset, path, created_at";

/// Row type for upload_sessions table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct UploadSessionRow {
    pub id: Uuid,
    pub upload_type: UploadType,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_offset: i64,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl UploadSessionRow {
    pub fn to_domain(self) -> UploadSession {
        UploadSession {
            id: self.id,
            upload_type: self.upload_type,
            user_id: self.user_id,
            file_name: self.file_name,
            file_size: self.file_size,
            file_offset: self.file_offset,
            path: self.path,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUploadSessionRepository {
    pool: PgPool,
}

impl PgUploadSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadSessionStore for PgUploadSessionRepository {
    #[tracing::instrument(skip(self, session), fields(db.table = "upload_sessions", db.record_id = %session.id))]
    async fn save(&self, session: &UploadSession) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_sessions
                (id, upload_type, user_id, file_name, file_size, file_offset, path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id)
        .bind(session.upload_type)
        .bind(session.user_id)
        .bind(&session.file_name)
        .bind(session.file_size)
        .bind(session.file_offset)
        .bind(&session.path)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_sessions", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> AppResult<Option<UploadSession>> {
        let row: Option<UploadSessionRow> = sqlx::query_as::<Postgres, UploadSessionRow>(&format!(
            "SELECT {} FROM upload_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_domain()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_sessions", user_id = %user_id))]
    async fn get_for_user(&self, user_id: Uuid) -> AppResult<Vec<UploadSession>> {
        let rows: Vec<UploadSessionRow> = sqlx::query_as::<Postgres, UploadSessionRow>(&format!(
            "SELECT {} FROM upload_sessions WHERE user_id = $1 ORDER BY created_at",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }

    #[tracing::instrument(skip(self, session), fields(db.table = "upload_sessions", db.record_id = %session.id, file_offset = session.file_offset))]
    async fn update(&self, session: &UploadSession) -> AppResult<()> {
        let result = sqlx::query("UPDATE upload_sessions SET file_offset = $2 WHERE id = $1")
            .bind(session.id)
            .bind(session.file_offset)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Upload session {}", session.id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_sessions", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM upload_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
