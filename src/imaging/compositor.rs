//! Blending a masked foreground over a [`Background`].
//!
//! The compositor only consumes an [`AlphaMask`]; it does not care which
//! segmentation strategy produced it. Switching backgrounds is a matter of
//! calling [`composite`] again with the same mask.

use super::bitmap::{AlphaMask, Bitmap};
use super::geometry::resize_exact;
use super::params::Background;
use crate::error::{EngineError, Result};
use rayon::prelude::*;

/// Combine `foreground`, weighted per pixel by `mask`, with `background`.
///
/// - `Transparent`: foreground RGB untouched, alpha replaced by the mask.
/// - `SolidColor`: `out = color * (1 - a) + fg * a`, fully opaque.
/// - `ImageFill`: the image is stretched to the foreground's size, then
///   blended the same way.
///
/// The mask must have the foreground's exact dimensions.
pub fn composite(foreground: &Bitmap, mask: &AlphaMask, background: &Background) -> Result<Bitmap> {
    if mask.dimensions() != foreground.dimensions() {
        return Err(EngineError::invalid_dimensions(mask.width(), mask.height()));
    }
    let (width, height) = foreground.dimensions();

    match background {
        Background::Transparent => Ok(replace_alpha(foreground, mask)),
        Background::SolidColor(color) => {
            let canvas = Bitmap::filled(width, height, [color.r, color.g, color.b, 255])?;
            Ok(blend(foreground, mask, canvas))
        }
        Background::ImageFill(image) => {
            let canvas = resize_exact(image, width, height)?;
            Ok(blend(foreground, mask, canvas))
        }
    }
}

fn replace_alpha(foreground: &Bitmap, mask: &AlphaMask) -> Bitmap {
    let mut output = foreground.clone();
    output
        .as_image_mut()
        .par_chunks_mut(4)
        .zip(mask.as_raw().par_iter())
        .for_each(|(px, &alpha)| px[3] = alpha);
    output
}

fn blend(foreground: &Bitmap, mask: &AlphaMask, mut canvas: Bitmap) -> Bitmap {
    let width = foreground.width() as usize;

    canvas
        .as_image_mut()
        .par_chunks_mut(width * 4)
        .zip(foreground.as_raw().par_chunks(width * 4))
        .zip(mask.as_raw().par_chunks(width))
        .for_each(|((out_row, fg_row), mask_row)| {
            for ((out, fg), &m) in out_row
                .chunks_exact_mut(4)
                .zip(fg_row.chunks_exact(4))
                .zip(mask_row)
            {
                blend_pixel(out, fg, m);
            }
        });
    canvas
}

#[inline]
fn blend_pixel(out: &mut [u8], fg: &[u8], mask: u8) {
    match mask {
        0 => {}
        255 => {
            out[..3].copy_from_slice(&fg[..3]);
            out[3] = 255;
        }
        _ => {
            let a = mask as f32 / 255.0;
            for c in 0..3 {
                out[c] = (out[c] as f32 * (1.0 - a) + fg[c] as f32 * a).round() as u8;
            }
            out[3] = (out[3] as f32 + (255.0 - out[3] as f32) * a).round() as u8;
        }
    }
}
