//! File record repository: CRUD for the file_infos table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use stowage_core::{AppError, AppResult, FileInfo};
use uuid::Uuid;

use crate::traits::FileInfoStore;

const FILE_INFO_COLUMNS: &str = "id, creator_id, name, extension, path, size, mime_type, width, height, \
     has_preview_image, thumbnail_path, preview_path, mini_preview, content, created_at, updated_at";

/// Row type for file_infos table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileInfoRow {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub extension: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub has_preview_image: bool,
    pub thumbnail_path: Option<String>,
    pub preview_path: Option<String>,
    pub mini_preview: Option<Vec<u8>>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileInfoRow {
    pub fn to_domain(self) -> FileInfo {
        FileInfo {
            id: self.id,
            creator_id: self.creator_id,
            name: self.name,
            extension: self.extension,
            path: self.path,
            size: self.size,
            mime_type: self.mime_type,
            width: self.width.and_then(|w| u32::try_from(w).ok()),
            height: self.height.and_then(|h| u32::try_from(h).ok()),
            has_preview_image: self.has_preview_image,
            thumbnail_path: self.thumbnail_path,
            preview_path: self.preview_path,
            mini_preview: self.mini_preview,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn dimension(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

#[derive(Clone)]
pub struct PgFileInfoRepository {
    pool: PgPool,
}

impl PgFileInfoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write(&self, info: &FileInfo, on_conflict: &str) -> AppResult<()> {
        let sql = format!(
            r#"
            INSERT INTO file_infos ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            {}
            "#,
            FILE_INFO_COLUMNS, on_conflict
        );

        sqlx::query(&sql)
            .bind(info.id)
            .bind(info.creator_id)
            .bind(&info.name)
            .bind(&info.extension)
            .bind(&info.path)
            .bind(info.size)
            .bind(&info.mime_type)
            .bind(dimension(info.width))
            .bind(dimension(info.height))
            .bind(info.has_preview_image)
            .bind(&info.thumbnail_path)
            .bind(&info.preview_path)
            .bind(&info.mini_preview)
            .bind(&info.content)
            .bind(info.created_at)
            .bind(info.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileInfoStore for PgFileInfoRepository {
    #[tracing::instrument(skip(self, info), fields(db.table = "file_infos", db.record_id = %info.id))]
    async fn save(&self, info: &FileInfo) -> AppResult<()> {
        self.write(info, "").await
    }

    #[tracing::instrument(skip(self, info), fields(db.table = "file_infos", db.record_id = %info.id))]
    async fn upsert(&self, info: &FileInfo) -> AppResult<()> {
        self.write(
            info,
            r#"ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                extension = EXCLUDED.extension,
                path = EXCLUDED.path,
                size = EXCLUDED.size,
                mime_type = EXCLUDED.mime_type,
                width = EXCLUDED.width,
                height = EXCLUDED.height,
                has_preview_image = EXCLUDED.has_preview_image,
                thumbnail_path = EXCLUDED.thumbnail_path,
                preview_path = EXCLUDED.preview_path,
                mini_preview = EXCLUDED.mini_preview,
                content = EXCLUDED.content,
                updated_at = EXCLUDED.updated_at"#,
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_infos", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> AppResult<Option<FileInfo>> {
        let row: Option<FileInfoRow> = sqlx::query_as::<Postgres, FileInfoRow>(&format!(
            "SELECT {} FROM file_infos WHERE id = $1",
            FILE_INFO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_domain()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_infos", creator_id = %creator_id))]
    async fn get_for_user(&self, creator_id: Uuid) -> AppResult<Vec<FileInfo>> {
        let rows: Vec<FileInfoRow> = sqlx::query_as::<Postgres, FileInfoRow>(&format!(
            "SELECT {} FROM file_infos WHERE creator_id = $1 ORDER BY created_at",
            FILE_INFO_COLUMNS
        ))
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }

    #[tracing::instrument(skip(self, content), fields(db.table = "file_infos", db.record_id = %id, content_len = content.len()))]
    async fn set_content(&self, id: Uuid, content: &str) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE file_infos SET content = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(content)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {}", id)));
        }
        Ok(())
    }
}
