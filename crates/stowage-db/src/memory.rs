//! In-memory metadata stores for tests and single-instance deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stowage_core::{AppError, AppResult, FileInfo, UploadSession};
use uuid::Uuid;

use crate::traits::{FileInfoStore, UploadSessionStore};

#[derive(Clone)]
struct Table<T> {
    rows: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Clone> Table<T> {
    fn read(&self) -> AppResult<RwLockReadGuard<'_, HashMap<Uuid, T>>> {
        self.rows
            .read()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, HashMap<Uuid, T>>> {
        self.rows
            .write()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }

    fn insert_new(&self, id: Uuid, row: T, what: &str) -> AppResult<()> {
        let mut rows = self.write()?;
        if rows.contains_key(&id) {
            return Err(AppError::InvalidInput(format!("{} {} already exists", what, id)));
        }
        rows.insert(id, row);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUploadSessionStore {
    table: Table<UploadSession>,
}

impl InMemoryUploadSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadSessionStore for InMemoryUploadSessionStore {
    async fn save(&self, session: &UploadSession) -> AppResult<()> {
        self.table
            .insert_new(session.id, session.clone(), "Upload session")
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<UploadSession>> {
        Ok(self.table.read()?.get(&id).cloned())
    }

    async fn get_for_user(&self, user_id: Uuid) -> AppResult<Vec<UploadSession>> {
        let mut sessions: Vec<UploadSession> = self
            .table
            .read()?
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn update(&self, session: &UploadSession) -> AppResult<()> {
        let mut rows = self.table.write()?;
        let stored = rows
            .get_mut(&session.id)
            .ok_or_else(|| AppError::NotFound(format!("Upload session {}", session.id)))?;
        stored.file_offset = session.file_offset;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.table.write()?.remove(&id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryFileInfoStore {
    table: Table<FileInfo>,
}

impl InMemoryFileInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileInfoStore for InMemoryFileInfoStore {
    async fn save(&self, info: &FileInfo) -> AppResult<()> {
        self.table.insert_new(info.id, info.clone(), "File")
    }

    async fn upsert(&self, info: &FileInfo) -> AppResult<()> {
        self.table.write()?.insert(info.id, info.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<FileInfo>> {
        Ok(self.table.read()?.get(&id).cloned())
    }

    async fn get_for_user(&self, creator_id: Uuid) -> AppResult<Vec<FileInfo>> {
        let mut files: Vec<FileInfo> = self
            .table
            .read()?
            .values()
            .filter(|f| f.creator_id == creator_id)
            .cloned()
            .collect();
        files.sort_by_key(|f| f.created_at);
        Ok(files)
    }

    async fn set_content(&self, id: Uuid, content: &str) -> AppResult<()> {
        let mut rows = self.table.write()?;
        let stored = rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("File {}", id)))?;
        stored.content = Some(content.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stowage_core::UploadType;

    fn session(user_id: Uuid) -> UploadSession {
        UploadSession {
            id: Uuid::new_v4(),
            upload_type: UploadType::Attachment,
            user_id,
            file_name: "a.bin".to_string(),
            file_size: 100,
            file_offset: 0,
            path: "a.bin".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_update_only_persists_offset() {
        let store = InMemoryUploadSessionStore::new();
        let original = session(Uuid::new_v4());
        store.save(&original).await.unwrap();

        let mut changed = original.clone();
        changed.file_offset = 40;
        changed.file_size = 1;
        changed.path = "elsewhere".to_string();
        store.update(&changed).await.unwrap();

        let stored = store.get(original.id).await.unwrap().unwrap();
        assert_eq!(stored.file_offset, 40);
        assert_eq!(stored.file_size, 100);
        assert_eq!(stored.path, "a.bin");
    }

    #[tokio::test]
    async fn test_update_missing_session_is_not_found() {
        let store = InMemoryUploadSessionStore::new();
        let err = store.update(&session(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sessions_for_user_and_delete() {
        let store = InMemoryUploadSessionStore::new();
        let user = Uuid::new_v4();
        let first = session(user);
        let second = session(user);
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        store.save(&session(Uuid::new_v4())).await.unwrap();

        assert_eq!(store.get_for_user(user).await.unwrap().len(), 2);
        assert!(store.save(&first).await.is_err());

        store.delete(first.id).await.unwrap();
        store.delete(first.id).await.unwrap();
        assert!(store.get(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_info_upsert_and_content() {
        let store = InMemoryFileInfoStore::new();
        let mut info = FileInfo::new(Uuid::new_v4(), "a.png", "a.png", 3);
        store.save(&info).await.unwrap();
        assert!(store.save(&info).await.is_err());

        info.mini_preview = Some(vec![1, 2, 3]);
        store.upsert(&info).await.unwrap();
        store.set_content(info.id, "text").await.unwrap();

        let stored = store.get(info.id).await.unwrap().unwrap();
        assert_eq!(stored.mini_preview, Some(vec![1, 2, 3]));
        assert_eq!(stored.content.as_deref(), Some("text"));
        assert_eq!(store.get_for_user(info.creator_id).await.unwrap().len(), 1);
        assert!(store.set_content(Uuid::new_v4(), "x").await.is_err());
    }
}
