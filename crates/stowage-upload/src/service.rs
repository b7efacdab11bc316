//! Upload service: wiring and session lifecycle.
//!
//! Chunk writing lives in `writer`, completion in `finalizer`, the non-resumable path
//! in `single_shot` and the read paths in `files`. They all hang off [`UploadService`].

use chrono::Utc;
use std::sync::Arc;
use stowage_core::{
    AppError, AppResult, FileUploadHook, NewUploadSession, UploadConfig, UploadSession, UploadType,
};
use stowage_db::{
    connect, FileInfoStore, InMemoryFileInfoStore, InMemoryUploadSessionStore, PgFileInfoRepository,
    PgUploadSessionRepository, UploadSessionStore,
};
use stowage_processing::{DerivativeGenerator, ImagePipeline};
use stowage_storage::{create_storage, keys, FileBackend};
use stowage_worker::{BackgroundQueue, BackgroundQueueConfig};
use uuid::Uuid;
use validator::Validate;

use crate::extractor::{extract_and_store, ContentExtractor, PlainTextExtractor};
use crate::guard::UploadLocks;

pub struct UploadService {
    pub(crate) config: Arc<UploadConfig>,
    pub(crate) storage: Arc<dyn FileBackend>,
    pub(crate) sessions: Arc<dyn UploadSessionStore>,
    pub(crate) files: Arc<dyn FileInfoStore>,
    pub(crate) derivatives: Arc<dyn DerivativeGenerator>,
    pub(crate) hooks: Vec<Arc<dyn FileUploadHook>>,
    pub(crate) extractor: Arc<dyn ContentExtractor>,
    pub(crate) background: Arc<BackgroundQueue>,
    pub(crate) locks: UploadLocks,
}

pub struct UploadServiceBuilder {
    config: UploadConfig,
    storage: Arc<dyn FileBackend>,
    sessions: Arc<dyn UploadSessionStore>,
    files: Arc<dyn FileInfoStore>,
    derivatives: Option<Arc<dyn DerivativeGenerator>>,
    hooks: Vec<Arc<dyn FileUploadHook>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
    background: Option<Arc<BackgroundQueue>>,
    locks: Option<UploadLocks>,
}

impl UploadServiceBuilder {
    pub fn derivatives(mut self, derivatives: Arc<dyn DerivativeGenerator>) -> Self {
        self.derivatives = Some(derivatives);
        self
    }

    /// Register a hook; hooks run in registration order.
    pub fn hook(mut self, hook: Arc<dyn FileUploadHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn background(mut self, background: Arc<BackgroundQueue>) -> Self {
        self.background = Some(background);
        self
    }

    /// Share a lock registry with another service instance in the same process.
    pub fn locks(mut self, locks: UploadLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Must be called inside a tokio runtime when no background queue was supplied.
    pub fn build(self) -> UploadService {
        let derivatives = self
            .derivatives
            .unwrap_or_else(|| Arc::new(ImagePipeline::from_config(self.storage.clone(), &self.config)));
        let background = self.background.unwrap_or_else(|| {
            Arc::new(BackgroundQueue::start(BackgroundQueueConfig::from_config(
                &self.config,
            )))
        });

        UploadService {
            config: Arc::new(self.config),
            storage: self.storage,
            sessions: self.sessions,
            files: self.files,
            derivatives,
            hooks: self.hooks,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(PlainTextExtractor)),
            background,
            locks: self.locks.unwrap_or_default(),
        }
    }
}

impl UploadService {
    pub fn builder(
        config: UploadConfig,
        storage: Arc<dyn FileBackend>,
        sessions: Arc<dyn UploadSessionStore>,
        files: Arc<dyn FileInfoStore>,
    ) -> UploadServiceBuilder {
        UploadServiceBuilder {
            config,
            storage,
            sessions,
            files,
            derivatives: None,
            hooks: Vec::new(),
            extractor: None,
            background: None,
            locks: None,
        }
    }

    /// Build a service from configuration alone.
    ///
    /// Uses PostgreSQL when `database_url` is set and in-memory stores otherwise.
    pub async fn from_config(config: UploadConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::InvalidInput(format!("Invalid configuration: {}", e)))?;

        let storage = create_storage(&config).await?;

        let (sessions, files): (Arc<dyn UploadSessionStore>, Arc<dyn FileInfoStore>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let pool = connect(url).await?;
                    (
                        Arc::new(PgUploadSessionRepository::new(pool.clone())),
                        Arc::new(PgFileInfoRepository::new(pool)),
                    )
                }
                None => (
                    Arc::new(InMemoryUploadSessionStore::new()),
                    Arc::new(InMemoryFileInfoStore::new()),
                ),
            };

        tracing::info!(
            storage_backend = %config.storage_backend,
            database = config.database_url.is_some(),
            "Upload service configured"
        );

        Ok(Self::builder(config, storage, sessions, files).build())
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn FileBackend> {
        &self.storage
    }

    pub fn locks(&self) -> &UploadLocks {
        &self.locks
    }

    /// Drain background work such as content extraction.
    pub async fn shutdown(&self) {
        self.background.shutdown().await;
    }

    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, file_name = %request.file_name))]
    pub async fn create_upload_session(&self, request: NewUploadSession) -> AppResult<UploadSession> {
        request.validate()?;

        let limit = self.config.max_file_size_bytes;
        if request.file_size as u64 > limit {
            return Err(AppError::FileTooLarge {
                size: request.file_size,
                limit,
            });
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let path = match request.upload_type {
            UploadType::Attachment => {
                keys::attachment_path(created_at, request.user_id, id, &request.file_name)
            }
            UploadType::Import => keys::import_path(&self.config.import_directory, id, &request.file_name),
        };
        keys::validate_path(&path)?;

        let session = UploadSession {
            id,
            upload_type: request.upload_type,
            user_id: request.user_id,
            file_name: request.file_name,
            file_size: request.file_size,
            file_offset: 0,
            path,
            created_at,
        };
        session.is_valid()?;

        self.sessions.save(&session).await?;

        tracing::info!(
            session_id = %session.id,
            upload_type = %session.upload_type,
            file_size = session.file_size,
            "Upload session created"
        );
        Ok(session)
    }

    pub async fn get_upload_session(&self, id: Uuid) -> AppResult<UploadSession> {
        self.sessions
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session {}", id)))
    }

    pub async fn get_upload_sessions_for_user(&self, user_id: Uuid) -> AppResult<Vec<UploadSession>> {
        self.sessions.get_for_user(user_id).await
    }

    /// Queue text extraction for a persisted record when enabled.
    pub(crate) fn schedule_content_extraction(&self, info: &stowage_core::FileInfo) {
        if !self.config.extract_content || !self.extractor.supports(info) {
            return;
        }

        let storage = self.storage.clone();
        let files = self.files.clone();
        let extractor = self.extractor.clone();
        let max_bytes = self.config.max_content_extraction_size;
        let info = info.clone();
        let file_id = info.id;

        let job = async move {
            extract_and_store(storage, files, extractor, info, max_bytes)
                .await
                .map_err(anyhow::Error::from)
        };

        if let Err(e) = self.background.submit(format!("extract-content-{}", file_id), job) {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to schedule content extraction");
        }
    }
}
