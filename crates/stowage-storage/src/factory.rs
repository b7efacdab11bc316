#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-memory")]
use crate::MemoryStorage;
use crate::{FileBackend, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use stowage_core::UploadConfig;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &UploadConfig) -> StorageResult<Arc<dyn FileBackend>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            if config.local_storage_path.trim().is_empty() {
                return Err(StorageError::ConfigError(
                    "LOCAL_STORAGE_PATH not configured".to_string(),
                ));
            }
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)"
                .to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local", feature = "storage-memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = UploadConfig {
            storage_backend: StorageBackend::Local,
            local_storage_path: dir.path().display().to_string(),
            ..UploadConfig::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);

        let config = UploadConfig {
            storage_backend: StorageBackend::Memory,
            ..UploadConfig::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_factory_rejects_empty_local_path() {
        let config = UploadConfig {
            storage_backend: StorageBackend::Local,
            local_storage_path: "  ".to_string(),
            ..UploadConfig::default()
        };
        assert!(matches!(
            create_storage(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
