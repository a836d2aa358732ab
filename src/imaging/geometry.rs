//! Resampling: user-facing resize plus the mask/background resizes used by
//! segmentation and compositing.
//!
//! Every resample in the crate goes through [`RESAMPLE_FILTER`], so a mask
//! scaled back up after analysis lines up with the image it was taken from.

use super::bitmap::{AlphaMask, Bitmap};
use super::calculations::{calculate_fit_dimensions, calculate_working_dimensions};
use crate::error::{EngineError, Result};
use image::imageops::{self, FilterType};

/// Interpolation shared by every resize in the crate.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Resize to the requested size, or to the largest size of the same aspect
/// ratio that fits inside it when `preserve_aspect` is set.
///
/// Fails with `InvalidDimensions` if either requested side is zero.
pub fn resize(
    bitmap: &Bitmap,
    target_width: u32,
    target_height: u32,
    preserve_aspect: bool,
) -> Result<Bitmap> {
    if target_width == 0 || target_height == 0 {
        return Err(EngineError::invalid_dimensions(target_width, target_height));
    }

    let (width, height) = if preserve_aspect {
        calculate_fit_dimensions(bitmap.dimensions(), (target_width, target_height))
    } else {
        (target_width, target_height)
    };
    tracing::debug!(
        from_width = bitmap.width(),
        from_height = bitmap.height(),
        width,
        height,
        preserve_aspect,
        "Resizing"
    );
    resize_exact(bitmap, width, height)
}

/// Stretch to exactly `width` x `height`, ignoring aspect ratio.
pub fn resize_exact(bitmap: &Bitmap, width: u32, height: u32) -> Result<Bitmap> {
    if width == 0 || height == 0 {
        return Err(EngineError::invalid_dimensions(width, height));
    }
    if bitmap.dimensions() == (width, height) {
        return Ok(bitmap.clone());
    }
    Bitmap::from_image(imageops::resize(
        bitmap.as_image(),
        width,
        height,
        RESAMPLE_FILTER,
    ))
}

/// Resample a mask, typically from working resolution back to the source's.
pub fn resize_mask(mask: &AlphaMask, width: u32, height: u32) -> Result<AlphaMask> {
    if width == 0 || height == 0 {
        return Err(EngineError::invalid_dimensions(width, height));
    }
    if mask.dimensions() == (width, height) {
        return Ok(mask.clone());
    }
    AlphaMask::from_image(imageops::resize(
        mask.as_image(),
        width,
        height,
        RESAMPLE_FILTER,
    ))
}

/// Downscaled copy for analysis when `bitmap` exceeds `max_dimension` on
/// either side; `None` means the original is already small enough.
pub(crate) fn working_copy(bitmap: &Bitmap, max_dimension: u32) -> Result<Option<Bitmap>> {
    match calculate_working_dimensions(bitmap.dimensions(), max_dimension) {
        Some((width, height)) => resize_exact(bitmap, width, height).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Bitmap {
        Bitmap::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn resize_exact_dimensions_without_aspect() {
        let resized = resize(&checker(100, 50), 30, 40, false).unwrap();
        assert_eq!(resized.dimensions(), (30, 40));
    }

    #[test]
    fn resize_preserving_aspect_fits_within_bounds() {
        let resized = resize(&checker(200, 100), 80, 80, true).unwrap();
        assert_eq!(resized.dimensions(), (80, 40));

        let resized = resize(&checker(100, 200), 80, 80, true).unwrap();
        assert_eq!(resized.dimensions(), (40, 80));
    }

    #[test]
    fn resize_rejects_zero_target() {
        assert!(matches!(
            resize(&checker(10, 10), 0, 10, true),
            Err(EngineError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(resize(&checker(10, 10), 10, 0, false).is_err());
    }

    #[test]
    fn resize_to_same_size_is_identity() {
        let original = checker(16, 16);
        assert_eq!(resize(&original, 16, 16, false).unwrap(), original);
    }

    #[test]
    fn uniform_color_survives_resampling() {
        let solid = Bitmap::filled(40, 30, [200, 100, 50, 255]).unwrap();
        let resized = resize(&solid, 17, 9, false).unwrap();
        assert!(
            resized
                .as_raw()
                .chunks_exact(4)
                .all(|px| px == [200, 100, 50, 255])
        );
    }

    #[test]
    fn resize_mask_keeps_uniform_values() {
        let mask = AlphaMask::filled(1024, 512, 255).unwrap();
        let up = resize_mask(&mask, 2000, 1000).unwrap();
        assert_eq!(up.dimensions(), (2000, 1000));
        assert!(up.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn working_copy_only_when_oversized() {
        assert!(working_copy(&checker(64, 64), 1024).unwrap().is_none());

        let copy = working_copy(&checker(300, 150), 100).unwrap().unwrap();
        assert_eq!(copy.dimensions(), (100, 50));
    }
}
