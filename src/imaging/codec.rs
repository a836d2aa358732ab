//! Decoding bytes into a [`Bitmap`] and encoding it back out.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff container | `image::guess_format` (magic bytes) |
//! | Decode (JPEG, PNG, WebP, TIFF) | `image::load_from_memory_with_format` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100, alpha dropped) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |

use super::bitmap::Bitmap;
use super::calculations::size_reduction_percent;
use super::params::{EncodeRequest, OutputFormat};
use crate::error::{EngineError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

/// Containers this build can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Png,
    Jpeg,
    WebP,
    Tiff,
}

impl SourceFormat {
    fn from_image_format(format: ImageFormat) -> Option<Self> {
        let source = match format {
            ImageFormat::Png => Self::Png,
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::WebP => Self::WebP,
            ImageFormat::Tiff => Self::Tiff,
            _ => return None,
        };
        format.reading_enabled().then_some(source)
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::WebP => ImageFormat::WebP,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// The format to re-encode into when the caller asks to keep the source
    /// format. TIFF has no encoder here, so it becomes PNG.
    pub fn output_format(self) -> OutputFormat {
        match self {
            Self::Png | Self::Tiff => OutputFormat::Png,
            Self::Jpeg => OutputFormat::Jpeg,
            Self::WebP => OutputFormat::WebP,
        }
    }
}

/// Identify the container from its magic bytes without decoding it.
pub fn sniff_format(bytes: &[u8]) -> Result<SourceFormat> {
    image::guess_format(bytes)
        .ok()
        .and_then(SourceFormat::from_image_format)
        .ok_or(EngineError::UnsupportedFormat)
}

/// Decode raster bytes into an RGBA bitmap.
///
/// Formats without an alpha channel decode fully opaque.
pub fn decode(bytes: &[u8]) -> Result<Bitmap> {
    let format = sniff_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format.image_format()).map_err(
        |e| match e {
            image::ImageError::Unsupported(_) => EngineError::UnsupportedFormat,
            other => EngineError::Decode(other.to_string()),
        },
    )?;

    let bitmap = Bitmap::from_image(image.to_rgba8())
        .map_err(|_| EngineError::Decode("image has zero width or height".into()))?;
    tracing::debug!(
        format = ?format,
        width = bitmap.width(),
        height = bitmap.height(),
        bytes = bytes.len(),
        "Decoded image"
    );
    Ok(bitmap)
}

/// Encoded output plus what a caller needs to report on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: OutputFormat,
}

impl EncodedImage {
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// How much smaller this output is than an input of `original_len` bytes.
    pub fn size_reduction_percent(&self, original_len: usize) -> f64 {
        size_reduction_percent(original_len as u64, self.bytes.len() as u64)
    }
}

/// Encode a bitmap. Quality only matters for JPEG.
pub fn encode(bitmap: &Bitmap, request: EncodeRequest) -> Result<EncodedImage> {
    let (width, height) = bitmap.dimensions();
    let mut bytes = Vec::new();

    let written = match request.format {
        OutputFormat::Png => PngEncoder::new(&mut bytes).write_image(
            bitmap.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::Jpeg => {
            let rgb = rgba_to_rgb(bitmap.as_raw());
            JpegEncoder::new_with_quality(&mut bytes, request.quality.to_percent()).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::WebP => WebPEncoder::new_lossless(&mut bytes).write_image(
            bitmap.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    written.map_err(|e| EngineError::Encode(format!("{}: {e}", request.format.extension())))?;

    tracing::debug!(
        format = request.format.mime_type(),
        quality = request.quality.value(),
        width,
        height,
        bytes = bytes.len(),
        "Encoded image"
    );
    Ok(EncodedImage {
        bytes,
        format: request.format,
    })
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}
