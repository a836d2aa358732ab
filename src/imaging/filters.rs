//! Tonal and spatial adjustments driven by a [`FilterSpec`].
//!
//! Steps always run in the same order, whatever the filter settings:
//!
//! ```text
//! brightness → contrast → saturation → grayscale → sepia → blur
//! ```
//!
//! The five tonal steps work per pixel on `f32` channels, clamping to
//! `[0, 255]` after every step and rounding once at the end; rows are
//! processed in parallel with rayon. Alpha is left alone by the tonal steps.
//! Blur runs last over all four channels so cut-out edges soften instead of
//! staying hard.

use super::bitmap::Bitmap;
use super::params::FilterSpec;
use image::imageops;
use rayon::prelude::*;

/// Sepia tone matrix, rows produce R, G, B.
const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Rec. 601 luma.
fn luminance([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Apply every adjustment in `spec` and return the filtered copy.
///
/// Never fails; an identity spec returns a pixel-identical bitmap.
pub fn apply_filters(bitmap: &Bitmap, spec: &FilterSpec) -> Bitmap {
    let mut output = bitmap.clone();

    if spec.has_tonal_steps() {
        let tonal = TonalSteps::from_spec(spec);
        let row_len = bitmap.width() as usize * 4;
        output
            .as_image_mut()
            .par_chunks_mut(row_len)
            .for_each(|row| row.chunks_exact_mut(4).for_each(|px| tonal.apply(px)));
    }

    let radius = spec.blur_radius();
    if radius > 0.0 {
        let blurred = imageops::blur(output.as_image(), radius);
        *output.as_image_mut() = blurred;
    }

    tracing::debug!(
        width = bitmap.width(),
        height = bitmap.height(),
        blur = radius,
        "Applied filters"
    );
    output
}

#[derive(Debug, Clone, Copy)]
struct TonalSteps {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    grayscale: bool,
    sepia: bool,
}

impl TonalSteps {
    fn from_spec(spec: &FilterSpec) -> Self {
        Self {
            brightness: spec.brightness_factor(),
            contrast: spec.contrast_factor(),
            saturation: spec.saturation_factor(),
            grayscale: spec.grayscale,
            sepia: spec.sepia,
        }
    }

    fn apply(&self, px: &mut [u8]) {
        let mut rgb = [px[0] as f32, px[1] as f32, px[2] as f32];

        if self.brightness != 1.0 {
            rgb = rgb.map(|c| clamp_channel(c * self.brightness));
        }
        if self.contrast != 1.0 {
            rgb = rgb.map(|c| clamp_channel(128.0 + (c - 128.0) * self.contrast));
        }
        if self.saturation != 1.0 {
            let y = luminance(rgb);
            rgb = rgb.map(|c| clamp_channel(y + (c - y) * self.saturation));
        }
        if self.grayscale {
            rgb = [clamp_channel(luminance(rgb)); 3];
        }
        if self.sepia {
            rgb = SEPIA.map(|row| clamp_channel(row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]));
        }

        for (dst, c) in px.iter_mut().zip(rgb) {
            *dst = c.round() as u8;
        }
    }
}

fn clamp_channel(value: f32) -> f32 {
    value.clamp(0.0, 255.0)
}
