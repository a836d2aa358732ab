//! In-memory raster types: [`Bitmap`] and [`AlphaMask`].
//!
//! Both wrap an `image` crate buffer so every pixel operation can reach for
//! `imageops` directly, but construction is funnelled through checked
//! constructors. A `Bitmap` is never zero-sized and its buffer is always
//! exactly `width * height * 4` bytes; an `AlphaMask` is never zero-sized
//! and holds exactly one byte per pixel.

use crate::error::{EngineError, Result};
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    /// Wrap an interleaved RGBA buffer.
    ///
    /// Fails with `InvalidDimensions` if either side is zero or the buffer is
    /// not exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != rgba_len(width, height) {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        RgbaImage::from_raw(width, height, data)
            .map(|pixels| Self { pixels })
            .ok_or_else(|| EngineError::invalid_dimensions(width, height))
    }

    /// A bitmap of a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        Self::from_fn(width, height, |_, _| rgba)
    }

    /// Build a bitmap pixel by pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        Ok(Self {
            pixels: RgbaImage::from_fn(width, height, |x, y| Rgba(f(x, y))),
        })
    }

    pub(crate) fn from_image(pixels: RgbaImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// RGBA of a single pixel. Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    /// Interleaved RGBA samples, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels.into_raw()
    }

    pub(crate) fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Mutable pixels. The buffer can be rewritten but not resized.
    pub(crate) fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }
}

/// Per-pixel opacity: 0 is background, 255 is foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    values: GrayImage,
}

impl AlphaMask {
    /// Wrap a single-channel buffer of exactly `width * height` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width as usize * height as usize {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        GrayImage::from_raw(width, height, data)
            .map(|values| Self { values })
            .ok_or_else(|| EngineError::invalid_dimensions(width, height))
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        Self::from_fn(width, height, |_, _| value)
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        Ok(Self {
            values: GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])),
        })
    }

    pub(crate) fn from_image(values: GrayImage) -> Result<Self> {
        let (width, height) = values.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_dimensions(width, height));
        }
        Ok(Self { values })
    }

    pub fn width(&self) -> u32 {
        self.values.width()
    }

    pub fn height(&self) -> u32 {
        self.values.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.values.dimensions()
    }

    /// Opacity at `(x, y)`. Panics if out of bounds.
    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.values.get_pixel(x, y).0[0]
    }

    pub fn as_raw(&self) -> &[u8] {
        self.values.as_raw()
    }

    pub(crate) fn as_image(&self) -> &GrayImage {
        &self.values
    }
}

fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}
