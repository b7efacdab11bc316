//! Configuration module
//!
//! `UploadConfig` holds every tunable of the upload pipeline: storage location, size
//! limits, derivative geometry and background queue sizing. Values come from the
//! environment (and an optional `.env` file) with defaults from [`crate::constants`].

use std::env;
use std::str::FromStr;

use crate::constants::{
    JPEG_QUALITY, MAX_CONTENT_EXTRACTION_SIZE, MAX_DECODED_IMAGE_BYTES, MAX_FILE_SIZE,
    MAX_IMAGE_RESOLUTION, MIB, MINI_PREVIEW_SIZE, MIN_FIRST_PART_SIZE, PREVIEW_WIDTH,
    THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH,
};
use crate::storage_types::StorageBackend;

const BACKGROUND_MAX_WORKERS: usize = 4;
const BACKGROUND_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    /// Directory (relative to the storage root) that import uploads land in
    pub import_directory: String,
    pub max_file_size_bytes: u64,
    pub min_first_part_size: u64,
    /// Maximum width * height of an accepted image
    pub max_image_resolution: u64,
    pub max_decoded_image_bytes: u64,
    pub max_concurrent_decodes: usize,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub preview_width: u32,
    pub mini_preview_size: u32,
    pub jpeg_quality: u8,
    pub extract_content: bool,
    pub max_content_extraction_size: usize,
    pub background_max_workers: usize,
    pub background_queue_capacity: usize,
    pub database_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            local_storage_path: "./data".to_string(),
            import_directory: "import".to_string(),
            max_file_size_bytes: MAX_FILE_SIZE,
            min_first_part_size: MIN_FIRST_PART_SIZE,
            max_image_resolution: MAX_IMAGE_RESOLUTION,
            max_decoded_image_bytes: MAX_DECODED_IMAGE_BYTES,
            max_concurrent_decodes: default_decode_concurrency(),
            thumbnail_width: THUMBNAIL_WIDTH,
            thumbnail_height: THUMBNAIL_HEIGHT,
            preview_width: PREVIEW_WIDTH,
            mini_preview_size: MINI_PREVIEW_SIZE,
            jpeg_quality: JPEG_QUALITY,
            extract_content: true,
            max_content_extraction_size: MAX_CONTENT_EXTRACTION_SIZE,
            background_max_workers: BACKGROUND_MAX_WORKERS,
            background_queue_capacity: BACKGROUND_QUEUE_CAPACITY,
            database_url: None,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => defaults.storage_backend,
        };

        let max_file_size_mb: u64 = env_or("MAX_FILE_SIZE_MB", defaults.max_file_size_bytes / MIB);

        let config = Self {
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| defaults.local_storage_path.clone()),
            import_directory: env::var("IMPORT_DIRECTORY")
                .unwrap_or_else(|_| defaults.import_directory.clone()),
            max_file_size_bytes: max_file_size_mb * MIB,
            min_first_part_size: env_or("MIN_FIRST_PART_SIZE_BYTES", defaults.min_first_part_size),
            max_image_resolution: env_or("MAX_IMAGE_RESOLUTION", defaults.max_image_resolution),
            max_decoded_image_bytes: env_or(
                "MAX_DECODED_IMAGE_BYTES",
                defaults.max_decoded_image_bytes,
            ),
            max_concurrent_decodes: env_or(
                "MAX_CONCURRENT_DECODES",
                defaults.max_concurrent_decodes,
            ),
            thumbnail_width: env_or("THUMBNAIL_WIDTH", defaults.thumbnail_width),
            thumbnail_height: env_or("THUMBNAIL_HEIGHT", defaults.thumbnail_height),
            preview_width: env_or("PREVIEW_WIDTH", defaults.preview_width),
            mini_preview_size: env_or("MINI_PREVIEW_SIZE", defaults.mini_preview_size),
            jpeg_quality: env_or("JPEG_QUALITY", defaults.jpeg_quality),
            extract_content: env::var("EXTRACT_CONTENT")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            max_content_extraction_size: env_or(
                "MAX_CONTENT_EXTRACTION_SIZE",
                defaults.max_content_extraction_size,
            ),
            background_max_workers: env_or(
                "BACKGROUND_MAX_WORKERS",
                defaults.background_max_workers,
            ),
            background_queue_capacity: env_or(
                "BACKGROUND_QUEUE_CAPACITY",
                defaults.background_queue_capacity,
            ),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.min_first_part_size == 0 || self.min_first_part_size > self.max_file_size_bytes {
            return Err(anyhow::anyhow!(
                "MIN_FIRST_PART_SIZE_BYTES must be between 1 and the maximum file size"
            ));
        }

        if self.max_image_resolution == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_RESOLUTION must be greater than 0"));
        }

        if self.max_concurrent_decodes == 0 || self.background_max_workers == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_DECODES and BACKGROUND_MAX_WORKERS must be greater than 0"
            ));
        }

        if self.background_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "BACKGROUND_QUEUE_CAPACITY must be greater than 0"
            ));
        }

        if self.thumbnail_width == 0
            || self.thumbnail_height == 0
            || self.preview_width == 0
            || self.mini_preview_size == 0
        {
            return Err(anyhow::anyhow!("Derivative dimensions must be greater than 0"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if self.import_directory.trim().is_empty() {
            return Err(anyhow::anyhow!("IMPORT_DIRECTORY must not be empty"));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        Ok(())
    }
}

fn env_or<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn default_decode_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
