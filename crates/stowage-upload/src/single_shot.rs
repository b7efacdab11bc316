use bytes::Bytes;
use chrono::Utc;
use std::io::Cursor;
use stowage_core::{AppError, AppResult, FileInfo, UploadContext};
use stowage_storage::keys;
use uuid::Uuid;

use crate::service::UploadService;

impl UploadService {
    /// Store a whole file in one call, without a session or lock.
    ///
    /// Returns the record and the bytes that were stored, which differ from `data` when a
    /// hook replaced the content.
    #[tracing::instrument(skip(self, context, data), fields(user_id = %context.user_id, size_bytes = data.len()))]
    pub async fn upload_file(
        &self,
        context: &UploadContext,
        name: &str,
        data: Bytes,
    ) -> AppResult<(FileInfo, Bytes)> {
        let limit = self.config.max_file_size_bytes;
        if data.len() as u64 > limit {
            return Err(AppError::FileTooLarge {
                size: data.len() as i64,
                limit,
            });
        }
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("File name must not be empty".to_string()));
        }

        let id = Uuid::new_v4();
        let path = keys::attachment_path(Utc::now(), context.user_id, id, name);
        keys::validate_path(&path)?;

        let mut info = FileInfo::new(context.user_id, keys::base_name(name), path, data.len() as i64);
        info.id = id;

        let prepared = self.prepare_file(context, info, data).await?;

        self.storage
            .write_file(Box::pin(Cursor::new(prepared.data.clone())), &prepared.info.path)
            .await?;

        let info = self
            .attach_derivatives(prepared.info, prepared.data.clone())
            .await;

        self.files.save(&info).await?;
        self.schedule_content_extraction(&info);

        tracing::info!(
            file_id = %info.id,
            path = %info.path,
            size_bytes = info.size,
            mime_type = %info.mime_type,
            "File uploaded"
        );
        Ok((info, prepared.data))
    }
}
