//! Text extraction from finished files.
//!
//! Runs on the background queue after a file record is persisted. Nothing here can
//! fail an upload; errors end up in the log.

use async_trait::async_trait;
use std::sync::Arc;
use stowage_core::{AppResult, FileInfo};
use stowage_db::FileInfoStore;
use stowage_storage::FileBackend;

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Whether this extractor understands the file at all
    fn supports(&self, info: &FileInfo) -> bool;

    /// Searchable text for the file, `None` when there is nothing worth storing
    async fn extract(&self, info: &FileInfo, data: &[u8]) -> anyhow::Result<Option<String>>;
}

/// Text-like formats, decoded as UTF-8 with invalid sequences replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-yaml",
    "application/toml",
];

#[async_trait]
impl ContentExtractor for PlainTextExtractor {
    fn supports(&self, info: &FileInfo) -> bool {
        (info.mime_type.starts_with("text/") || TEXT_MIME_TYPES.contains(&info.mime_type.as_str()))
            && !info.is_svg()
    }

    async fn extract(&self, _info: &FileInfo, data: &[u8]) -> anyhow::Result<Option<String>> {
        let text = String::from_utf8_lossy(data);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }
}

/// Cut `text` to at most `max_bytes`, backing off to the previous char boundary.
pub fn truncate_on_char_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}

/// Read, extract and store content for one file record.
pub(crate) async fn extract_and_store(
    storage: Arc<dyn FileBackend>,
    files: Arc<dyn FileInfoStore>,
    extractor: Arc<dyn ContentExtractor>,
    info: FileInfo,
    max_bytes: usize,
) -> AppResult<()> {
    let data = storage.read_file(&info.path).await?;
    let content = extractor.extract(&info, &data).await?;

    let Some(content) = content else {
        tracing::debug!(file_id = %info.id, "No content extracted");
        return Ok(());
    };

    let content = truncate_on_char_boundary(content, max_bytes);
    files.set_content(info.id, &content).await?;

    tracing::debug!(
        file_id = %info.id,
        size_bytes = content.len(),
        "File content extracted"
    );
    Ok(())
}
