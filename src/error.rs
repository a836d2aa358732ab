//! Error type shared by every engine operation.
//!
//! Every variant is terminal for the call that raised it: nothing inside the
//! engine retries, and nothing degrades to a "best effort" result. A failed
//! segmentation never turns into an all-opaque mask.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The byte stream is not a raster format this build can decode.
    #[error("Unsupported image format")]
    UnsupportedFormat,
    /// The container was recognised but its contents are malformed.
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    /// A zero-sized target, or a mask whose size does not match its image.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),
    /// Only the pending load attempt fails; the next call loads again.
    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),
}

impl EngineError {
    pub(crate) fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }
}
