#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use stowage_core::{
    AppError, AppResult, FileInfo, FileUploadHook, HookOutcome, NewUploadSession, UploadConfig, UploadContext,
    UploadSession, UploadType,
};
use stowage_db::{InMemoryFileInfoStore, InMemoryUploadSessionStore, UploadSessionStore};
use stowage_processing::{
    BoundedDecoder, DerivativeGenerator, DerivativeSet, DerivativeSettings, DerivativeTargets,
    ImagePipeline,
};
use stowage_storage::{FileBackend, MemoryStorage};
use stowage_upload::UploadService;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use uuid::Uuid;

pub const MIB: usize = 1024 * 1024;

// ---- fixtures ----

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 90, if x % 2 == 0 { 255 } else { 100 }])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 85)
        .encode_image(&img)
        .unwrap();
    out
}

/// Insert a minimal little-endian EXIF APP1 segment carrying `orientation` right after SOI.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let [lo, hi] = orientation.to_le_bytes();

    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
    app1.extend_from_slice(&[0x01, 0x00]);
    app1.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, lo, hi, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Grow a JPEG to exactly `target_len` bytes with comment segments after SOI.
pub fn pad_jpeg(jpeg: &[u8], target_len: usize) -> Vec<u8> {
    const MAX_SEGMENT: usize = 4 + 65533;
    assert!(target_len >= jpeg.len() + 4, "target too small");

    let mut needed = target_len - jpeg.len();
    let mut padding = Vec::with_capacity(needed);
    while needed > 0 {
        let mut segment = needed.min(MAX_SEGMENT);
        if (1..4).contains(&(needed - segment)) {
            segment -= 4;
        }
        let payload = segment - 4;
        let length = (payload + 2) as u16;
        padding.extend_from_slice(&[0xFF, 0xFE]);
        padding.extend_from_slice(&length.to_be_bytes());
        padding.resize(padding.len() + payload, b'x');
        needed -= segment;
    }

    let mut out = Vec::with_capacity(target_len);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&padding);
    out.extend_from_slice(&jpeg[2..]);
    assert_eq!(out.len(), target_len);
    out
}

pub fn filler(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// ---- readers ----

pub fn reader(data: Vec<u8>) -> Cursor<Vec<u8>> {
    Cursor::new(data)
}

/// Yields `data`, then fails with a connection reset.
pub fn failing_after(data: Vec<u8>) -> impl AsyncRead + Send + 'static {
    Cursor::new(data).chain(ResetReader)
}

pub struct ResetReader;

impl AsyncRead for ResetReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
    }
}

// ---- doubles ----

/// Wraps an `ImagePipeline`, counting calls.
pub struct CountingGenerator {
    inner: ImagePipeline,
    pub generate_calls: AtomicUsize,
    pub mini_preview_calls: AtomicUsize,
}

impl CountingGenerator {
    pub fn new(storage: Arc<dyn FileBackend>) -> Self {
        Self {
            inner: ImagePipeline::new(
                storage,
                BoundedDecoder::new(2, 512 * MIB as u64),
                DerivativeSettings::default(),
            ),
            generate_calls: AtomicUsize::new(0),
            mini_preview_calls: AtomicUsize::new(0),
        }
    }

    pub fn generated(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn mini_previews(&self) -> usize {
        self.mini_preview_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DerivativeGenerator for CountingGenerator {
    async fn generate(&self, data: Bytes, targets: DerivativeTargets) -> anyhow::Result<DerivativeSet> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate(data, targets).await
    }

    async fn mini_preview(&self, data: Bytes) -> anyhow::Result<Vec<u8>> {
        self.mini_preview_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mini_preview(data).await
    }
}

/// Counts invocations and optionally rejects or replaces content.
#[derive(Default)]
pub struct RecordingHook {
    pub calls: AtomicUsize,
    pub reject_with: Option<String>,
    pub replace_with: Option<Vec<u8>>,
}

impl RecordingHook {
    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn replacing(content: &[u8]) -> Self {
        Self {
            replace_with: Some(content.to_vec()),
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileUploadHook for RecordingHook {
    async fn file_will_be_uploaded(
        &self,
        _context: &UploadContext,
        _info: &FileInfo,
        _content: &[u8],
    ) -> HookOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.reject_with {
            return HookOutcome::reject(reason.clone());
        }
        HookOutcome {
            replacement_content: self.replace_with.clone(),
            ..HookOutcome::default()
        }
    }
}

/// Session store whose offset updates can be switched to fail.
pub struct FlakySessionStore {
    inner: Arc<InMemoryUploadSessionStore>,
    fail_updates: AtomicBool,
}

#[async_trait]
impl UploadSessionStore for FlakySessionStore {
    async fn save(&self, session: &UploadSession) -> AppResult<()> {
        self.inner.save(session).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<UploadSession>> {
        self.inner.get(id).await
    }

    async fn get_for_user(&self, user_id: Uuid) -> AppResult<Vec<UploadSession>> {
        self.inner.get_for_user(user_id).await
    }

    async fn update(&self, session: &UploadSession) -> AppResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("session store unavailable".to_string()));
        }
        self.inner.update(session).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.inner.delete(id).await
    }
}

// ---- harness ----

pub struct Harness {
    pub service: Arc<UploadService>,
    pub storage: MemoryStorage,
    pub sessions: Arc<InMemoryUploadSessionStore>,
    pub files: Arc<InMemoryFileInfoStore>,
    pub generator: Arc<CountingGenerator>,
    pub flaky_sessions: Arc<FlakySessionStore>,
    pub user_id: Uuid,
}

pub fn harness() -> Harness {
    harness_with(UploadConfig::default(), Vec::new())
}

pub fn harness_with(config: UploadConfig, hooks: Vec<Arc<dyn FileUploadHook>>) -> Harness {
    let storage = MemoryStorage::new();
    let backend: Arc<dyn FileBackend> = Arc::new(storage.clone());
    let sessions = Arc::new(InMemoryUploadSessionStore::new());
    let files = Arc::new(InMemoryFileInfoStore::new());
    let generator = Arc::new(CountingGenerator::new(backend.clone()));
    let flaky_sessions = Arc::new(FlakySessionStore {
        inner: sessions.clone(),
        fail_updates: AtomicBool::new(false),
    });

    let mut builder = UploadService::builder(config, backend, flaky_sessions.clone(), files.clone())
        .derivatives(generator.clone());
    for hook in hooks {
        builder = builder.hook(hook);
    }

    Harness {
        service: Arc::new(builder.build()),
        storage,
        sessions,
        files,
        generator,
        flaky_sessions,
        user_id: Uuid::new_v4(),
    }
}

impl Harness {
    pub fn fail_offset_updates(&self, fail: bool) {
        self.flaky_sessions.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub async fn session(&self, file_name: &str, file_size: usize) -> UploadSession {
        self.session_of(UploadType::Attachment, file_name, file_size).await
    }

    pub async fn session_of(&self, upload_type: UploadType, file_name: &str, file_size: usize) -> UploadSession {
        self.service
            .create_upload_session(NewUploadSession {
                upload_type,
                user_id: self.user_id,
                file_name: file_name.to_string(),
                file_size: file_size as i64,
            })
            .await
            .unwrap()
    }
}
