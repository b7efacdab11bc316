//! Stowage Processing Library
//!
//! Image inspection and derivative generation for uploaded files: dimension probing,
//! EXIF orientation, memory-bounded decoding and the thumbnail / preview / mini-preview
//! pipeline that streams encoded JPEGs straight into a storage backend.

pub mod image;
pub mod metadata;
pub mod pipeline;

pub use crate::image::{BoundedDecoder, DecodedImage, ImageOrientation, ImageProcessor};
pub use metadata::ImageMetadata;
pub use pipeline::{DerivativeGenerator, DerivativeSet, DerivativeSettings, DerivativeTargets, ImagePipeline};
