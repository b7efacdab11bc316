//! Plugin hooks around file persistence
//!
//! Plugins get a look at every file right before its `FileInfo` is written. A hook may
//! swap the record, swap the bytes or reject the upload outright. The pipeline only
//! depends on the [`FileUploadHook`] trait; plugin hosts implement it.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::FileInfo;

/// Who is uploading, passed to every hook invocation
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub request_id: Option<String>,
}

impl UploadContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            session_id: None,
            request_id: None,
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// What a hook decided about a file
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    pub replacement_info: Option<FileInfo>,
    pub replacement_content: Option<Vec<u8>>,
    pub rejection_reason: Option<String>,
}

impl HookOutcome {
    pub fn accept() -> Self {
        Self::default()
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            rejection_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait FileUploadHook: Send + Sync {
    /// Called once per file before its record is persisted
    async fn file_will_be_uploaded(
        &self,
        context: &UploadContext,
        info: &FileInfo,
        content: &[u8],
    ) -> HookOutcome;
}

/// Hook that accepts everything unchanged
pub struct NoOpUploadHook;

#[async_trait]
impl FileUploadHook for NoOpUploadHook {
    async fn file_will_be_uploaded(
        &self,
        _context: &UploadContext,
        _info: &FileInfo,
        _content: &[u8],
    ) -> HookOutcome {
        HookOutcome::accept()
    }
}

/// Run `hooks` in order, threading replacements from one hook into the next.
///
/// The first rejection stops the chain. A replacement with empty content is ignored.
/// When content is replaced the record's `size` is recomputed.
pub async fn run_upload_hooks(
    hooks: &[Arc<dyn FileUploadHook>],
    context: &UploadContext,
    mut info: FileInfo,
    mut content: Vec<u8>,
) -> AppResult<(FileInfo, Vec<u8>)> {
    for hook in hooks {
        let outcome = hook.file_will_be_uploaded(context, &info, &content).await;

        if let Some(reason) = outcome.rejection_reason {
            tracing::info!(
                file_name = %info.name,
                user_id = %context.user_id,
                reason = %reason,
                "Upload rejected by plugin"
            );
            return Err(AppError::PluginRejected { reason });
        }

        if let Some(replacement) = outcome.replacement_info {
            info = replacement;
        }

        if let Some(replacement) = outcome.replacement_content.filter(|c| !c.is_empty()) {
            content = replacement;
        }
        info.size = content.len() as i64;
    }

    Ok((info, content))
}
