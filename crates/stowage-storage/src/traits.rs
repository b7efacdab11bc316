//! Storage abstraction trait
//!
//! This module defines the `FileBackend` trait that all storage backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use stowage_core::AppError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Streaming input accepted by write and append calls
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

pub(crate) const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The stream failed after `written` bytes were durably stored.
    #[error("Write interrupted after {written} bytes: {reason}")]
    Interrupted { written: u64, reason: String },

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Bytes that reached the backend before the failure
    pub fn bytes_written(&self) -> u64 {
        match self {
            StorageError::Interrupted { written, .. } => *written,
            _ => 0,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("File not found: {}", path)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte storage used by the upload pipeline.
///
/// Write and append either succeed with the number of bytes stored or fail. A failure
/// after some bytes were stored is reported as [`StorageError::Interrupted`] so callers
/// can account for the partial progress. Appends are not atomic across calls.
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Create or truncate `path` and fill it from `reader` until EOF
    async fn write_file(&self, reader: ByteReader, path: &str) -> StorageResult<u64>;

    /// Append everything from `reader` to the existing object at `path`
    async fn append_file(&self, reader: ByteReader, path: &str) -> StorageResult<u64>;

    /// Read the whole object
    async fn read_file(&self, path: &str) -> StorageResult<Bytes>;

    /// Open the object as a stream
    async fn file_reader(&self, path: &str) -> StorageResult<ByteReader>;

    /// Remove the object. Removing a missing object is not an error.
    async fn remove_file(&self, path: &str) -> StorageResult<()>;

    /// Move an object, replacing anything at `to`
    async fn move_file(&self, from: &str, to: &str) -> StorageResult<()>;

    async fn file_exists(&self, path: &str) -> StorageResult<bool>;

    async fn file_size(&self, path: &str) -> StorageResult<u64>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Copy `reader` into `writer`, returning the bytes written even when the copy fails.
pub(crate) async fn copy_counted<W>(
    reader: &mut ByteReader,
    writer: &mut W,
) -> (u64, Option<std::io::Error>)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return (total, None),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return (total, Some(e)),
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            return (total, Some(e));
        }
        total += n as u64;
    }
}

/// Map the outcome of a counted copy onto the write contract.
pub(crate) fn copy_outcome(
    path: &str,
    written: u64,
    error: Option<std::io::Error>,
) -> StorageResult<u64> {
    match error {
        None => Ok(written),
        Some(e) if written > 0 => Err(StorageError::Interrupted {
            written,
            reason: format!("{}: {}", path, e),
        }),
        Some(e) => Err(StorageError::WriteFailed(format!("{}: {}", path, e))),
    }
}
