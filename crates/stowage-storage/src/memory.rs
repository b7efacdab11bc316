use crate::keys::validate_path;
use crate::traits::{copy_counted, copy_outcome, ByteReader, FileBackend, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-process storage backend.
///
/// Objects live in a shared map, so clones observe each other's writes. Streams are
/// buffered before the map is touched; the lock is never held across an await.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = match self.objects.read() {
            Ok(objects) => objects.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();
        paths
    }

    fn get(&self, path: &str) -> StorageResult<Option<Bytes>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(path).cloned())
    }

    fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.insert(path.to_string(), data);
        Ok(())
    }
}

fn poisoned() -> StorageError {
    StorageError::BackendError("Memory storage lock poisoned".to_string())
}

#[async_trait]
impl FileBackend for MemoryStorage {
    async fn write_file(&self, mut reader: ByteReader, path: &str) -> StorageResult<u64> {
        validate_path(path)?;

        let mut buffer = Vec::new();
        let (written, error) = copy_counted(&mut reader, &mut buffer).await;
        self.put(path, Bytes::from(buffer))?;

        tracing::debug!(key = %path, size_bytes = written, "Memory storage write");
        copy_outcome(path, written, error)
    }

    async fn append_file(&self, mut reader: ByteReader, path: &str) -> StorageResult<u64> {
        validate_path(path)?;

        if self.get(path)?.is_none() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let mut buffer = Vec::new();
        let (written, error) = copy_counted(&mut reader, &mut buffer).await;

        {
            let mut objects = self.objects.write().map_err(|_| poisoned())?;
            let existing = objects
                .get(path)
                .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
            let mut combined = Vec::with_capacity(existing.len() + buffer.len());
            combined.extend_from_slice(existing);
            combined.extend_from_slice(&buffer);
            objects.insert(path.to_string(), Bytes::from(combined));
        }

        tracing::debug!(key = %path, size_bytes = written, "Memory storage append");
        copy_outcome(path, written, error)
    }

    async fn read_file(&self, path: &str) -> StorageResult<Bytes> {
        validate_path(path)?;
        self.get(path)?
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn file_reader(&self, path: &str) -> StorageResult<ByteReader> {
        let data = self.read_file(path).await?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn remove_file(&self, path: &str) -> StorageResult<()> {
        validate_path(path)?;
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.remove(path);
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> StorageResult<()> {
        validate_path(from)?;
        validate_path(to)?;
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let data = objects
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), data);
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        Ok(self.get(path)?.is_some())
    }

    async fn file_size(&self, path: &str) -> StorageResult<u64> {
        Ok(self.read_file(path).await?.len() as u64)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> ByteReader {
        Box::pin(data)
    }

    #[tokio::test]
    async fn test_clones_share_objects() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        storage.write_file(reader(b"abc"), "x/a").await.unwrap();
        clone.append_file(reader(b"def"), "x/a").await.unwrap();

        assert_eq!(&storage.read_file("x/a").await.unwrap()[..], b"abcdef");
        assert_eq!(storage.paths(), vec!["x/a".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_objects() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.read_file("nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.append_file(reader(b"1"), "nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.remove_file("nope").await.is_ok());
        assert!(!storage.file_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_replaces_destination() {
        let storage = MemoryStorage::new();
        storage.write_file(reader(b"new"), "a.tmp").await.unwrap();
        storage.write_file(reader(b"old"), "a").await.unwrap();

        storage.move_file("a.tmp", "a").await.unwrap();

        assert_eq!(&storage.read_file("a").await.unwrap()[..], b"new");
        assert!(!storage.file_exists("a.tmp").await.unwrap());
    }
}
