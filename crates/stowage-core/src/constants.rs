//! Pipeline-wide constants and the defaults `UploadConfig` falls back to.

/// Bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// A first chunk smaller than this is rejected unless it is the whole file.
pub const MIN_FIRST_PART_SIZE: u64 = 5 * MIB;

/// Largest accepted image, in pixels (24 megapixels).
pub const MAX_IMAGE_RESOLUTION: u64 = 6048 * 4032;

pub const MAX_FILE_SIZE: u64 = 100 * MIB;

/// Upper bound for a single decoded pixel buffer.
pub const MAX_DECODED_IMAGE_BYTES: u64 = 512 * MIB;

pub const THUMBNAIL_WIDTH: u32 = 120;
pub const THUMBNAIL_HEIGHT: u32 = 100;
pub const PREVIEW_WIDTH: u32 = 1920;
pub const MINI_PREVIEW_SIZE: u32 = 16;
pub const JPEG_QUALITY: u8 = 90;

/// Extracted text is truncated to this many bytes before it is stored.
pub const MAX_CONTENT_EXTRACTION_SIZE: usize = 1024 * 1024;

/// Suffix appended to import uploads until they are finalized.
pub const IMPORT_STAGING_SUFFIX: &str = ".tmp";

pub const PREVIEW_SUFFIX: &str = "_preview.jpg";
pub const THUMBNAIL_SUFFIX: &str = "_thumb.jpg";
