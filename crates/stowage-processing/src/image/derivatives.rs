//! Derivative shaping and JPEG encoding.
//!
//! Everything here is synchronous and CPU bound; callers run it on the blocking pool.

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::io::Write;

/// Composite any alpha channel onto a white background.
///
/// Derivatives are always JPEG, which has no alpha. Opaque images pass through untouched.
pub fn fill_transparency(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |channel: u8| -> u8 {
            ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    DynamicImage::ImageRgb8(out)
}

/// Fit inside a `width` x `height` box keeping aspect ratio. Smaller images are not upscaled.
pub fn thumbnail(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= width && h <= height {
        return img.clone();
    }
    img.resize(width, height, FilterType::Lanczos3)
}

/// Scale to `width` keeping aspect ratio. Narrower images keep their size.
pub fn preview(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= width {
        return img.clone();
    }
    let height = ((h as u64 * width as u64) / w as u64).max(1) as u32;
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Tiny square crop-to-fill image encoded as JPEG, stored inline on the file record.
pub fn mini_preview_bytes(img: &DynamicImage, size: u32, quality: u8) -> anyhow::Result<Vec<u8>> {
    let small = img.resize_to_fill(size, size, FilterType::Triangle);
    let mut out = Vec::new();
    encode_jpeg(&small, quality, &mut out)?;
    Ok(out)
}

pub fn encode_jpeg<W: Write>(img: &DynamicImage, quality: u8, writer: W) -> anyhow::Result<()> {
    let rgb = img.to_rgb8();
    JpegEncoder::new_with_quality(writer, quality)
        .encode_image(&rgb)
        .context("Failed to encode JPEG")
}
