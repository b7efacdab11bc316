//! Turning stored bytes into a file record.
//!
//! Shared by the resumable path (after the last chunk) and the single-shot path.

use bytes::Bytes;
use std::io::Cursor;
use std::time::Instant;
use stowage_core::{
    run_upload_hooks, AppError, AppResult, DerivativePaths, FileInfo, UploadContext, UploadSession,
    UploadType,
};
use stowage_processing::image::svg::svg_dimensions;
use stowage_processing::{DerivativeTargets, ImageProcessor};

use crate::service::UploadService;

/// A record and its content after hooks have had their say
pub(crate) struct PreparedFile {
    pub info: FileInfo,
    pub data: Bytes,
    /// A hook swapped the content, so the stored object is stale
    pub replaced: bool,
}

/// Raster images we could measure get thumbnail, preview and mini-preview.
pub(crate) fn wants_derivatives(info: &FileInfo) -> bool {
    info.is_image() && !info.is_svg() && info.width.is_some() && info.height.is_some()
}

impl UploadService {
    /// Create the file record for a session whose last byte has landed.
    ///
    /// An oversized image or a plugin rejection fails the call and leaves the session and
    /// the stored bytes in place. Dropping the session afterwards is best effort.
    pub(crate) async fn finalize(&self, session: &UploadSession) -> AppResult<FileInfo> {
        let start = Instant::now();
        let upload_path = session.upload_path();

        let data = self.storage.read_file(&upload_path).await?;
        let info = FileInfo::new(
            session.user_id,
            &session.file_name,
            session.path.clone(),
            data.len() as i64,
        );
        let context = UploadContext::new(session.user_id).with_session(session.id);

        let prepared = self.prepare_file(&context, info, data).await?;
        if prepared.replaced {
            self.storage
                .write_file(Box::pin(Cursor::new(prepared.data.clone())), &upload_path)
                .await?;
        }

        let info = self.attach_derivatives(prepared.info, prepared.data).await;

        if session.upload_type == UploadType::Import {
            self.storage.move_file(&upload_path, &session.path).await?;
        }

        self.files.save(&info).await?;
        self.schedule_content_extraction(&info);

        if let Err(e) = self.sessions.delete(session.id).await {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to delete upload session");
        }

        tracing::info!(
            session_id = %session.id,
            file_id = %info.id,
            size_bytes = info.size,
            mime_type = %info.mime_type,
            has_preview_image = info.has_preview_image,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload finalized"
        );
        Ok(info)
    }

    /// Measure, run hooks and enforce the resolution limit.
    pub(crate) async fn prepare_file(
        &self,
        context: &UploadContext,
        info: FileInfo,
        data: Bytes,
    ) -> AppResult<PreparedFile> {
        let info = describe(info, &data);

        let (info, data, replaced) = if self.hooks.is_empty() {
            (info, data, false)
        } else {
            let (info, content) = run_upload_hooks(&self.hooks, context, info, data.to_vec()).await?;
            if content.as_slice() == data.as_ref() {
                (info, data, false)
            } else {
                let data = Bytes::from(content);
                (describe(info, &data), data, true)
            }
        };

        self.check_resolution(&info)?;

        Ok(PreparedFile {
            info,
            data,
            replaced,
        })
    }

    fn check_resolution(&self, info: &FileInfo) -> AppResult<()> {
        if !info.is_image() {
            return Ok(());
        }
        let (Some(width), Some(height)) = (info.width, info.height) else {
            return Ok(());
        };

        let max_resolution = self.config.max_image_resolution;
        if u64::from(width) * u64::from(height) > max_resolution {
            tracing::debug!(
                file_name = %info.name,
                width = width,
                height = height,
                max_resolution = max_resolution,
                "Image resolution over limit"
            );
            return Err(AppError::ImageTooLarge {
                width,
                height,
                max_resolution,
            });
        }
        Ok(())
    }

    /// Generate derivatives and record the ones that made it to the backend.
    pub(crate) async fn attach_derivatives(&self, mut info: FileInfo, data: Bytes) -> FileInfo {
        if !wants_derivatives(&info) {
            return info;
        }

        let paths = DerivativePaths::for_object(&info.path, &info.name);
        let targets = DerivativeTargets {
            thumbnail_path: Some(paths.thumbnail),
            preview_path: Some(paths.preview),
            mini_preview: !info.has_mini_preview(),
        };

        match self.derivatives.generate(data, targets).await {
            Ok(set) => {
                info.thumbnail_path = set.thumbnail_path;
                info.preview_path = set.preview_path;
                if set.mini_preview.is_some() {
                    info.mini_preview = set.mini_preview;
                }
            }
            Err(e) => {
                tracing::warn!(file_name = %info.name, error = %e, "Image derivatives could not be generated");
                info.thumbnail_path = None;
                info.preview_path = None;
            }
        }

        info
    }
}

/// Fill in dimensions and the preview flag from the content.
fn describe(mut info: FileInfo, data: &[u8]) -> FileInfo {
    info.size = data.len() as i64;
    info.width = None;
    info.height = None;
    info.has_preview_image = false;

    if info.is_svg() {
        if let Some((width, height)) = svg_dimensions(data) {
            info.width = Some(width);
            info.height = Some(height);
        }
        return info;
    }

    if !info.is_image() {
        return info;
    }

    match ImageProcessor::probe(data) {
        Ok(meta) => {
            info.width = Some(meta.width);
            info.height = Some(meta.height);
            info.has_preview_image = !meta.animated;
        }
        Err(e) => {
            tracing::warn!(file_name = %info.name, error = %e, "Could not read image dimensions");
        }
    }

    info
}
