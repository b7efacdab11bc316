use crate::keys::validate_path;
use crate::traits::{copy_counted, copy_outcome, ByteReader, FileBackend, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the directory if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage path to a filesystem path, refusing anything that resolves
    /// outside the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_path(key)?;

        let path = self.base_path.join(key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn copy_into_file(
        &self,
        mut reader: ByteReader,
        mut file: fs::File,
        key: &str,
        operation: &'static str,
    ) -> StorageResult<u64> {
        let start = std::time::Instant::now();

        let (written, error) = copy_counted(&mut reader, &mut file).await;

        // Bytes already handed to the file must be durable before the count is reported.
        if let Err(e) = file.sync_all().await {
            return Err(StorageError::WriteFailed(format!(
                "Failed to sync file {}: {}",
                key, e
            )));
        }

        if let Some(ref e) = error {
            tracing::warn!(
                key = %key,
                size_bytes = written,
                error = %e,
                operation,
                "Local storage stream ended with error"
            );
        } else {
            tracing::info!(
                key = %key,
                size_bytes = written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                operation,
                "Local storage write successful"
            );
        }

        copy_outcome(key, written, error)
    }
}

#[async_trait]
impl FileBackend for LocalStorage {
    async fn write_file(&self, reader: ByteReader, path: &str) -> StorageResult<u64> {
        let fs_path = self.key_to_path(path)?;
        self.ensure_parent_dir(&fs_path).await?;

        let file = fs::File::create(&fs_path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create file {}: {}",
                fs_path.display(),
                e
            ))
        })?;

        self.copy_into_file(reader, file, path, "write").await
    }

    async fn append_file(&self, reader: ByteReader, path: &str) -> StorageResult<u64> {
        let fs_path = self.key_to_path(path)?;

        let file = fs::OpenOptions::new()
            .append(true)
            .open(&fs_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
                _ => StorageError::WriteFailed(format!(
                    "Failed to open file {} for append: {}",
                    fs_path.display(),
                    e
                )),
            })?;

        self.copy_into_file(reader, file, path, "append").await
    }

    async fn read_file(&self, path: &str) -> StorageResult<Bytes> {
        let fs_path = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        let data = fs::read(&fs_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                fs_path.display(),
                e
            )),
        })?;

        tracing::debug!(
            key = %path,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(Bytes::from(data))
    }

    async fn file_reader(&self, path: &str) -> StorageResult<ByteReader> {
        let fs_path = self.key_to_path(path)?;

        let file = fs::File::open(&fs_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::ReadFailed(format!(
                "Failed to open file {}: {}",
                fs_path.display(),
                e
            )),
        })?;

        Ok(Box::pin(file))
    }

    async fn remove_file(&self, path: &str) -> StorageResult<()> {
        let fs_path = self.key_to_path(path)?;

        if !fs::try_exists(&fs_path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&fs_path).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                fs_path.display(),
                e
            ))
        })?;

        tracing::info!(key = %path, "Local storage delete successful");
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from)?;
        let to_path = self.key_to_path(to)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            StorageError::MoveFailed(format!(
                "Failed to move {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::info!(from_key = %from, to_key = %to, "Local storage move successful");
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        let fs_path = self.key_to_path(path)?;
        Ok(fs::try_exists(&fs_path).await.unwrap_or(false))
    }

    async fn file_size(&self, path: &str) -> StorageResult<u64> {
        let fs_path = self.key_to_path(path)?;
        let meta = fs::metadata(&fs_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::BackendError(e.to_string()),
        })?;
        Ok(meta.len())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
