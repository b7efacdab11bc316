use anyhow::Context;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use std::sync::Arc;
use stowage_core::UploadConfig;
use tokio::sync::Semaphore;

/// A decoded raster image together with the format it was sniffed as.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
}

/// Decodes images on the blocking pool, with a cap on how many decodes run at once and on
/// how much memory a single decode may allocate.
#[derive(Clone)]
pub struct BoundedDecoder {
    permits: Arc<Semaphore>,
    max_alloc: u64,
}

impl BoundedDecoder {
    pub fn new(max_concurrent: usize, max_alloc: u64) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_alloc,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_concurrent_decodes, config.max_decoded_image_bytes)
    }

    /// Permits not currently held by a decode
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn decode(&self, data: Bytes) -> anyhow::Result<DecodedImage> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("Image decoder has been shut down")?;

        let max_alloc = self.max_alloc;
        tokio::task::spawn_blocking(move || decode_bounded(&data, max_alloc))
            .await
            .context("Image decode task panicked")?
    }
}

fn decode_bounded(data: &[u8], max_alloc: u64) -> anyhow::Result<DecodedImage> {
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?;
    let format = reader.format();

    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);
    reader.limits(limits);

    let image = reader.decode().context("Failed to decode image")?;
    Ok(DecodedImage { image, format })
}
