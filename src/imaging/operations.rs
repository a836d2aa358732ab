//! High-level image operations.
//!
//! Each function is a bytes-in, bytes-out pipeline:
//!
//! ```text
//! decode → transform (resize / filters / segment + composite) → encode
//! ```
//!
//! The pixel work lives in the stage modules; these functions only pick the
//! output format and quality and log what happened. [`ImageEngine`] bundles
//! them with an [`EngineConfig`] so callers don't thread defaults through
//! every call.

use super::bitmap::{AlphaMask, Bitmap};
use super::codec::{EncodedImage, decode, encode, sniff_format};
use super::compositor::composite;
use super::filters::apply_filters;
use super::geometry::resize;
use super::params::{Background, EncodeRequest, FilterSpec, OutputFormat, Quality};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::segment::{ModelLoader, Phase, ProgressSink, Segmenter, SegmenterKind};
use std::sync::Arc;

/// Re-encode `bytes` into `format`.
///
/// `quality` defaults to 0.95 and only affects JPEG.
pub fn convert_format(
    bytes: &[u8],
    format: OutputFormat,
    quality: Option<Quality>,
) -> Result<EncodedImage> {
    let bitmap = decode(bytes)?;
    let output = encode(&bitmap, EncodeRequest::new(format, quality.unwrap_or_default()))?;
    tracing::debug!(
        to = ?format,
        input_bytes = bytes.len(),
        output_bytes = output.len(),
        "Converted image"
    );
    Ok(output)
}

/// Re-encode in the source's own format at `quality`.
///
/// TIFF input comes back as PNG. Lossless formats ignore `quality`, so the
/// output may be larger than the input; use
/// [`EncodedImage::size_reduction_percent`] to report the outcome.
pub fn compress(bytes: &[u8], quality: Quality) -> Result<EncodedImage> {
    let format = sniff_format(bytes)?.output_format();
    let bitmap = decode(bytes)?;
    let output = encode(&bitmap, EncodeRequest::new(format, quality))?;
    tracing::debug!(
        format = ?format,
        quality = quality.value(),
        input_bytes = bytes.len(),
        output_bytes = output.len(),
        reduction = output.size_reduction_percent(bytes.len()),
        "Compressed image"
    );
    Ok(output)
}

/// Resize and re-encode in the source's format at the default quality.
///
/// With `preserve_aspect` the result fits within `width` x `height`;
/// otherwise it is stretched to exactly that size.
pub fn resize_image(
    bytes: &[u8],
    width: u32,
    height: u32,
    preserve_aspect: bool,
) -> Result<EncodedImage> {
    let format = sniff_format(bytes)?.output_format();
    let resized = resize(&decode(bytes)?, width, height, preserve_aspect)?;
    encode(&resized, EncodeRequest::new(format, Quality::default()))
}

/// Apply `spec` and re-encode in the source's format at full quality.
pub fn apply_filter_to_image(bytes: &[u8], spec: &FilterSpec) -> Result<EncodedImage> {
    let format = sniff_format(bytes)?.output_format();
    let filtered = apply_filters(&decode(bytes)?, spec);
    encode(&filtered, EncodeRequest::new(format, Quality::max()))
}

/// Segment `image` and composite the foreground over `background`.
///
/// Returns the mask alongside the result so a caller can try other
/// backgrounds with [`composite`] without segmenting again.
pub async fn cut_out(
    image: &Bitmap,
    segmenter: &dyn Segmenter,
    background: &Background,
    progress: &dyn ProgressSink,
) -> Result<(Bitmap, AlphaMask)> {
    let mask = segmenter.segment(image, progress).await?;
    progress.report(Phase::Finalizing);
    let composited = composite(image, &mask, background)?;
    Ok((composited, mask))
}

/// Remove the background from encoded image bytes.
///
/// Always encodes PNG so transparency survives, whatever the input was.
pub async fn remove_background(
    bytes: &[u8],
    segmenter: &dyn Segmenter,
    background: &Background,
    progress: &dyn ProgressSink,
) -> Result<EncodedImage> {
    let image = decode(bytes)?;
    let (composited, _) = cut_out(&image, segmenter, background, progress).await?;
    let output = encode(&composited, OutputFormat::Png.into())?;
    tracing::debug!(
        segmenter = segmenter.name(),
        width = image.width(),
        height = image.height(),
        output_bytes = output.len(),
        "Removed background"
    );
    Ok(output)
}

/// Configured entry point to every operation.
#[derive(Debug, Clone)]
pub struct ImageEngine {
    config: EngineConfig,
    segmenter: SegmenterKind,
}

impl ImageEngine {
    /// Build an engine for `config`.
    ///
    /// `loader` is required when the config selects learned segmentation.
    pub fn new(config: EngineConfig, loader: Option<Arc<dyn ModelLoader>>) -> Result<Self> {
        let segmenter = SegmenterKind::from_config(&config.segmentation, loader)?;
        tracing::info!(segmenter = segmenter.name(), "Image engine ready");
        Ok(Self { config, segmenter })
    }

    /// Engine with an explicit segmenter, bypassing `config.segmentation`.
    pub fn with_segmenter(config: EngineConfig, segmenter: SegmenterKind) -> Self {
        Self { config, segmenter }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &SegmenterKind {
        &self.segmenter
    }

    /// [`convert_format`], defaulting to `encoding.default_quality`.
    pub fn convert_format(
        &self,
        bytes: &[u8],
        format: OutputFormat,
        quality: Option<Quality>,
    ) -> Result<EncodedImage> {
        let quality =
            quality.unwrap_or_else(|| Quality::new(self.config.encoding.default_quality));
        convert_format(bytes, format, Some(quality))
    }

    /// [`compress`] at `encoding.compress_quality`.
    pub fn compress(&self, bytes: &[u8]) -> Result<EncodedImage> {
        compress(bytes, Quality::new(self.config.encoding.compress_quality))
    }

    pub fn resize_image(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        preserve_aspect: bool,
    ) -> Result<EncodedImage> {
        resize_image(bytes, width, height, preserve_aspect)
    }

    pub fn apply_filter_to_image(&self, bytes: &[u8], spec: &FilterSpec) -> Result<EncodedImage> {
        apply_filter_to_image(bytes, spec)
    }

    /// [`remove_background`] with the configured segmenter.
    pub async fn remove_background(
        &self,
        bytes: &[u8],
        background: &Background,
        progress: &dyn ProgressSink,
    ) -> Result<EncodedImage> {
        remove_background(bytes, &self.segmenter, background, progress).await
    }
}
