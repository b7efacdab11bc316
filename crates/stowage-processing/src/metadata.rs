use image::ImageFormat;

/// Intrinsic properties of an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Width as displayed, after EXIF orientation
    pub width: u32,
    /// Height as displayed, after EXIF orientation
    pub height: u32,
    pub format: Option<ImageFormat>,
    /// EXIF orientation (1-8), 1 when absent
    pub orientation: u8,
    /// More than one frame (animated GIF)
    pub animated: bool,
}

impl ImageMetadata {
    pub fn resolution(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}
