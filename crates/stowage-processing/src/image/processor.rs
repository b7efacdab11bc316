//! Image processor - metadata probing and EXIF orientation

use anyhow::Context;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::metadata::ImageMetadata;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Probe an encoded raster image without decoding its pixels.
    ///
    /// Reported dimensions are already swapped for 90/270 degree EXIF orientations.
    pub fn probe(data: &[u8]) -> Result<ImageMetadata, anyhow::Error> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to sniff image format")?;
        let format = reader.format();
        let (raw_width, raw_height) = reader
            .into_dimensions()
            .context("Failed to read image dimensions")?;

        let orientation = Self::read_exif_orientation(data);
        let (width, height) = if Self::swaps_dimensions(orientation) {
            (raw_height, raw_width)
        } else {
            (raw_width, raw_height)
        };

        let animated = format == Some(ImageFormat::Gif) && Self::is_animated_gif(data);

        Ok(ImageMetadata {
            width,
            height,
            format,
            orientation,
            animated,
        })
    }

    /// Read EXIF orientation tag from image data.
    ///
    /// Returns orientation value (1-8), or 1 (normal) when the container has no EXIF
    /// block or the tag is missing or out of range.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let mut cursor = Cursor::new(data);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u8::try_from(value).ok())
            .filter(|value| (1..=8).contains(value))
            .unwrap_or(1)
    }

    /// Orientations 5-8 involve a quarter turn, so width and height trade places.
    pub fn swaps_dimensions(orientation: u8) -> bool {
        matches!(orientation, 5..=8)
    }

    /// A GIF with more than one frame. Undecodable data is treated as a still image.
    ///
    /// Only frame descriptors are walked. LZW data is discarded unread and nothing is
    /// composited onto the logical screen, so neither frame nor canvas size drives an allocation.
    pub fn is_animated_gif(data: &[u8]) -> bool {
        let mut options = gif::DecodeOptions::new();
        options.skip_frame_decoding(true);
        let mut decoder = match options.read_info(Cursor::new(data)) {
            Ok(decoder) => decoder,
            Err(_) => return false,
        };

        let mut frames = 0;
        while frames < 2 {
            match decoder.next_frame_info() {
                Ok(Some(_)) => frames += 1,
                Ok(None) | Err(_) => break,
            }
        }
        frames > 1
    }

    /// Get rotation and flip operations needed for a given EXIF orientation.
    /// Returns (rotate_angle, flip_horizontal, flip_vertical); flips apply before rotation.
    pub fn get_orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(270), true, false),  // Mirror horizontal + Rotate 270 CW
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(90), true, false),   // Mirror horizontal + Rotate 90 CW
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),      // Invalid, treat as normal
        }
    }
}
