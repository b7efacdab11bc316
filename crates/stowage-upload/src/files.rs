use bytes::Bytes;
use futures::future::join_all;
use stowage_core::{AppError, AppResult, FileInfo};
use uuid::Uuid;

use crate::finalizer::wants_derivatives;
use crate::service::UploadService;

impl UploadService {
    /// Fetch a file record, back-filling its mini-preview if it has none yet.
    #[tracing::instrument(skip(self))]
    pub async fn get_file_info(&self, id: Uuid) -> AppResult<FileInfo> {
        let info = self.stored_file_info(id).await?;
        Ok(self.ensure_mini_preview(info).await)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_file_infos_for_user(&self, user_id: Uuid) -> AppResult<Vec<FileInfo>> {
        let infos = self.files.get_for_user(user_id).await?;
        Ok(join_all(infos.into_iter().map(|info| self.ensure_mini_preview(info))).await)
    }

    /// Stored bytes of a file
    pub async fn get_file(&self, id: Uuid) -> AppResult<Bytes> {
        let info = self.stored_file_info(id).await?;
        Ok(self.storage.read_file(&info.path).await?)
    }

    async fn stored_file_info(&self, id: Uuid) -> AppResult<FileInfo> {
        self.files
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {}", id)))
    }

    /// Never fails: a generation problem is logged and the record returned as stored.
    async fn ensure_mini_preview(&self, mut info: FileInfo) -> FileInfo {
        if info.has_mini_preview() || !wants_derivatives(&info) {
            return info;
        }

        let data = match self.storage.read_file(&info.path).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(file_id = %info.id, error = %e, "Failed to read file for mini-preview");
                return info;
            }
        };

        let mini_preview = match self.derivatives.mini_preview(data).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return info,
            Err(e) => {
                tracing::warn!(file_id = %info.id, error = %e, "Failed to generate mini-preview");
                return info;
            }
        };

        info.mini_preview = Some(mini_preview);
        if let Err(e) = self.files.upsert(&info).await {
            tracing::warn!(file_id = %info.id, error = %e, "Failed to store mini-preview");
        }
        info
    }
}
