//! Corner-color background estimation.
//!
//! Assumes the four corners of the frame show background, as they do in
//! most product shots and portraits. The mean corner color is the background
//! estimate; every pixel within `threshold` (Euclidean RGB distance) of it
//! is cut away.
//!
//! With the default `softness` of 0 the cut is binary. A positive softness
//! ramps opacity linearly from 0 at `threshold` to 255 at
//! `threshold + softness`, trading a little background bleed for less
//! fringing along the edge.

use super::{Phase, ProgressSink, Segmenter};
use crate::config::SegmentationConfig;
use crate::error::Result;
use crate::imaging::geometry::{resize_mask, working_copy};
use crate::imaging::{AlphaMask, Bitmap};
use async_trait::async_trait;
use rayon::prelude::*;

pub const DEFAULT_MAX_WORKING_DIMENSION: u32 = 1024;
pub const DEFAULT_THRESHOLD: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicColorDistance {
    max_working_dimension: u32,
    threshold: f32,
    softness: f32,
}

impl Default for HeuristicColorDistance {
    fn default() -> Self {
        Self {
            max_working_dimension: DEFAULT_MAX_WORKING_DIMENSION,
            threshold: DEFAULT_THRESHOLD,
            softness: 0.0,
        }
    }
}

impl HeuristicColorDistance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new()
            .with_max_working_dimension(config.max_working_dimension)
            .with_threshold(config.threshold)
            .with_softness(config.softness)
    }

    /// Images larger than this on either side are analysed downscaled.
    pub fn with_max_working_dimension(mut self, max: u32) -> Self {
        self.max_working_dimension = max.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    pub fn with_softness(mut self, softness: f32) -> Self {
        self.softness = softness.max(0.0);
        self
    }

    /// Synchronous segmentation; the async [`Segmenter`] impl wraps this.
    pub fn segment_blocking(&self, image: &Bitmap, progress: &dyn ProgressSink) -> Result<AlphaMask> {
        progress.report(Phase::Analyzing);
        let working = working_copy(image, self.max_working_dimension)?;
        let analysed = working.as_ref().unwrap_or(image);
        let background = estimate_background(analysed);

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            downscaled = working.is_some(),
            background = ?background,
            threshold = self.threshold,
            "Estimated background from corners"
        );

        progress.report(Phase::Removing);
        let values: Vec<u8> = analysed
            .as_raw()
            .par_chunks_exact(4)
            .map(|px| self.opacity(color_distance(px, background)))
            .collect();
        let mask = AlphaMask::from_raw(analysed.width(), analysed.height(), values)?;

        if working.is_some() {
            progress.report(Phase::ResizingMask);
            resize_mask(&mask, image.width(), image.height())
        } else {
            Ok(mask)
        }
    }

    fn opacity(&self, distance: f32) -> u8 {
        if distance < self.threshold {
            0
        } else if self.softness > 0.0 && distance < self.threshold + self.softness {
            ((distance - self.threshold) / self.softness * 255.0).round() as u8
        } else {
            255
        }
    }
}

#[async_trait]
impl Segmenter for HeuristicColorDistance {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn segment(&self, image: &Bitmap, progress: &dyn ProgressSink) -> Result<AlphaMask> {
        self.segment_blocking(image, progress)
    }
}

/// Mean RGB of the four corner pixels.
pub fn estimate_background(image: &Bitmap) -> [f32; 3] {
    let (right, bottom) = (image.width() - 1, image.height() - 1);
    let corners = [
        image.pixel(0, 0),
        image.pixel(right, 0),
        image.pixel(0, bottom),
        image.pixel(right, bottom),
    ];

    let mut sum = [0.0f32; 3];
    for corner in corners {
        for (acc, channel) in sum.iter_mut().zip(corner) {
            *acc += channel as f32;
        }
    }
    sum.map(|s| s / 4.0)
}

fn color_distance(px: &[u8], background: [f32; 3]) -> f32 {
    let dr = px[0] as f32 - background[0];
    let dg = px[1] as f32 - background[1];
    let db = px[2] as f32 - background[2];
    (dr * dr + dg * dg + db * db).sqrt()
}
