//! Image processing module
//!
//! - Metadata probing and EXIF orientation (processor)
//! - Orientation correction of pixel buffers (orientation)
//! - Memory-bounded decoding (decoder)
//! - Derivative geometry and JPEG encoding (derivatives)
//! - SVG size sniffing (svg)

pub mod decoder;
pub mod derivatives;
pub mod orientation;
pub mod processor;
pub mod svg;

pub use decoder::{BoundedDecoder, DecodedImage};
pub use orientation::ImageOrientation;
pub use processor::ImageProcessor;
