//! Derivative pipeline
//!
//! One decode feeds three concurrent branches. Thumbnail and preview are encoded on the
//! blocking pool straight into an in-memory pipe whose other end is the storage write, so
//! an encoded derivative is never held in memory in full. A failed branch is dropped from
//! the result; the others still land.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use stowage_core::constants::{
    JPEG_QUALITY, MINI_PREVIEW_SIZE, PREVIEW_WIDTH, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH,
};
use stowage_core::UploadConfig;
use stowage_storage::FileBackend;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;

use crate::image::derivatives::{encode_jpeg, fill_transparency, mini_preview_bytes, preview, thumbnail};
use crate::image::{BoundedDecoder, ImageOrientation};

const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// Derivative geometry and encoding quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSettings {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub preview_width: u32,
    pub mini_preview_size: u32,
    pub jpeg_quality: u8,
}

impl Default for DerivativeSettings {
    fn default() -> Self {
        Self {
            thumbnail_width: THUMBNAIL_WIDTH,
            thumbnail_height: THUMBNAIL_HEIGHT,
            preview_width: PREVIEW_WIDTH,
            mini_preview_size: MINI_PREVIEW_SIZE,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl DerivativeSettings {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            thumbnail_width: config.thumbnail_width,
            thumbnail_height: config.thumbnail_height,
            preview_width: config.preview_width,
            mini_preview_size: config.mini_preview_size,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Which derivatives to produce and where the stored ones go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativeTargets {
    pub thumbnail_path: Option<String>,
    pub preview_path: Option<String>,
    pub mini_preview: bool,
}

impl DerivativeTargets {
    pub fn is_empty(&self) -> bool {
        self.thumbnail_path.is_none() && self.preview_path.is_none() && !self.mini_preview
    }
}

/// Derivatives that were actually produced.
///
/// A path is present only when its object was written in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativeSet {
    pub thumbnail_path: Option<String>,
    pub preview_path: Option<String>,
    pub mini_preview: Option<Vec<u8>>,
}

#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// Produce the requested derivatives from encoded source bytes.
    ///
    /// Errors only when the source cannot be decoded at all; a failure in one derivative
    /// just leaves it out of the returned set.
    async fn generate(&self, data: Bytes, targets: DerivativeTargets) -> anyhow::Result<DerivativeSet>;

    /// Encode the inline mini-preview alone.
    async fn mini_preview(&self, data: Bytes) -> anyhow::Result<Vec<u8>>;
}

/// `DerivativeGenerator` backed by the `image` crate and a storage backend
pub struct ImagePipeline {
    storage: Arc<dyn FileBackend>,
    decoder: BoundedDecoder,
    settings: DerivativeSettings,
}

impl ImagePipeline {
    pub fn new(storage: Arc<dyn FileBackend>, decoder: BoundedDecoder, settings: DerivativeSettings) -> Self {
        Self {
            storage,
            decoder,
            settings,
        }
    }

    pub fn from_config(storage: Arc<dyn FileBackend>, config: &UploadConfig) -> Self {
        Self::new(
            storage,
            BoundedDecoder::from_config(config),
            DerivativeSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &DerivativeSettings {
        &self.settings
    }

    /// Decode, make upright and flatten onto white.
    async fn prepare(&self, data: Bytes) -> anyhow::Result<Arc<DynamicImage>> {
        let decoded = self.decoder.decode(data.clone()).await?;
        let image = tokio::task::spawn_blocking(move || {
            let upright = ImageOrientation::apply_exif_orientation(decoded.image, &data);
            fill_transparency(upright)
        })
        .await
        .context("Image preparation task panicked")?;
        Ok(Arc::new(image))
    }

    /// Write one stored derivative, returning its path on success.
    async fn store_derivative<F>(
        &self,
        kind: &'static str,
        source: Arc<DynamicImage>,
        path: &str,
        shape: F,
    ) -> Option<String>
    where
        F: FnOnce(&DynamicImage) -> DynamicImage + Send + 'static,
    {
        let start = Instant::now();
        match self.stream_jpeg(source, path, shape).await {
            Ok(size) => {
                tracing::debug!(
                    derivative = kind,
                    path = %path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Derivative stored"
                );
                Some(path.to_string())
            }
            Err(e) => {
                tracing::warn!(derivative = kind, path = %path, error = %e, "Derivative generation failed");
                if let Err(remove_err) = self.storage.remove_file(path).await {
                    tracing::warn!(
                        path = %path,
                        error = %remove_err,
                        "Failed to remove partial derivative"
                    );
                }
                None
            }
        }
    }

    async fn stream_jpeg<F>(&self, source: Arc<DynamicImage>, path: &str, shape: F) -> anyhow::Result<u64>
    where
        F: FnOnce(&DynamicImage) -> DynamicImage + Send + 'static,
    {
        let (writer, reader) = tokio::io::duplex(PIPE_BUFFER_SIZE);
        let quality = self.settings.jpeg_quality;
        let handle = Handle::current();

        let producer = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let shaped = shape(&source);
            let mut bridge = SyncIoBridge::new_with_handle(writer, handle);
            encode_jpeg(&shaped, quality, &mut bridge)?;
            bridge.flush().context("Failed to flush derivative stream")?;
            bridge.shutdown().context("Failed to close derivative stream")?;
            Ok(())
        });
        let consumer = self.storage.write_file(Box::pin(reader), path);

        let (produced, consumed) = tokio::join!(producer, consumer);
        let produced = produced.map_err(|e| anyhow!("Derivative encode task panicked: {}", e))?;

        match (produced, consumed) {
            (Ok(()), Ok(written)) => Ok(written),
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(anyhow!("Derivative write failed: {}", e)),
        }
    }

    async fn encode_mini_preview(&self, source: Arc<DynamicImage>) -> anyhow::Result<Vec<u8>> {
        let size = self.settings.mini_preview_size;
        let quality = self.settings.jpeg_quality;
        tokio::task::spawn_blocking(move || mini_preview_bytes(&source, size, quality))
            .await
            .context("Mini-preview task panicked")?
    }
}

#[async_trait]
impl DerivativeGenerator for ImagePipeline {
    async fn generate(&self, data: Bytes, targets: DerivativeTargets) -> anyhow::Result<DerivativeSet> {
        if targets.is_empty() {
            return Ok(DerivativeSet::default());
        }

        let source = self.prepare(data).await?;
        let settings = self.settings;

        let thumbnail_branch = async {
            match targets.thumbnail_path.as_deref() {
                Some(path) => {
                    self.store_derivative("thumbnail", source.clone(), path, move |img| {
                        thumbnail(img, settings.thumbnail_width, settings.thumbnail_height)
                    })
                    .await
                }
                None => None,
            }
        };
        let preview_branch = async {
            match targets.preview_path.as_deref() {
                Some(path) => {
                    self.store_derivative("preview", source.clone(), path, move |img| {
                        preview(img, settings.preview_width)
                    })
                    .await
                }
                None => None,
            }
        };
        let mini_branch = async {
            if !targets.mini_preview {
                return None;
            }
            match self.encode_mini_preview(source.clone()).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, "Mini-preview generation failed");
                    None
                }
            }
        };

        let (thumbnail_path, preview_path, mini_preview) =
            tokio::join!(thumbnail_branch, preview_branch, mini_branch);

        Ok(DerivativeSet {
            thumbnail_path,
            preview_path,
            mini_preview,
        })
    }

    async fn mini_preview(&self, data: Bytes) -> anyhow::Result<Vec<u8>> {
        let source = self.prepare(data).await?;
        self.encode_mini_preview(source).await
    }
}
