use async_trait::async_trait;
use stowage_core::{AppResult, FileInfo, UploadSession};
use uuid::Uuid;

#[async_trait]
pub trait UploadSessionStore: Send + Sync {
    async fn save(&self, session: &UploadSession) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<UploadSession>>;

    /// Sessions created by `user_id`, oldest first
    async fn get_for_user(&self, user_id: Uuid) -> AppResult<Vec<UploadSession>>;

    /// Persist `session.file_offset`. No other field is written.
    async fn update(&self, session: &UploadSession) -> AppResult<()>;

    /// Deleting a missing session is not an error
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait FileInfoStore: Send + Sync {
    async fn save(&self, info: &FileInfo) -> AppResult<()>;

    async fn upsert(&self, info: &FileInfo) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<FileInfo>>;

    /// Files created by `creator_id`, oldest first
    async fn get_for_user(&self, creator_id: Uuid) -> AppResult<Vec<FileInfo>>;

    /// Store extracted text for a file
    async fn set_content(&self, id: Uuid, content: &str) -> AppResult<()>;
}
