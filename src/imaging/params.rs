//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! vocabulary shared between the bytes-in/bytes-out
//! [`operations`](super::operations) and the pixel-level stages
//! ([`codec`](super::codec), [`filters`](super::filters),
//! [`compositor`](super::compositor)).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a fraction (0.0 to 1.0, default 0.95). Clamped on construction.
//! - [`OutputFormat`]: PNG, JPEG or WebP, with MIME type and file extension.
//! - [`EncodeRequest`]: Target format plus quality.
//! - [`FilterSpec`]: Independent tonal/spatial knobs, all optional.
//! - [`Rgb`] / [`Background`]: What to put behind a matted foreground.

use super::bitmap::Bitmap;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding, as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    /// Clamp into `[0, 1]`. Non-finite input falls back to the default.
    pub fn new(value: f32) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self::default()
        }
    }

    /// Highest quality, used when re-encoding filtered images.
    pub fn max() -> Self {
        Self(1.0)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1–100 scale the JPEG encoder expects.
    pub fn to_percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.95)
    }
}

/// Encodable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    #[serde(rename = "webp")]
    WebP,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// File extension for downloads (`jpg`, not `jpeg`).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Parse a MIME type such as `image/webp`. Case-insensitive.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Whether quality is ignored when encoding to this format.
    ///
    /// WebP is lossless here: the pure-Rust encoder has no lossy mode.
    pub fn is_lossless(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

/// Target format plus quality for [`codec::encode`](super::codec::encode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeRequest {
    pub format: OutputFormat,
    pub quality: Quality,
}

impl EncodeRequest {
    pub fn new(format: OutputFormat, quality: Quality) -> Self {
        Self { format, quality }
    }
}

impl From<OutputFormat> for EncodeRequest {
    fn from(format: OutputFormat) -> Self {
        Self::new(format, Quality::default())
    }
}

/// Tonal and spatial adjustments, applied by
/// [`apply_filters`](super::filters::apply_filters).
///
/// Every knob is optional; `None` (or `false`) leaves that dimension alone.
/// Percentages use 100 as identity and are clamped to 0–200, blur radius is
/// clamped to 0–10 px. Keys are the snake_case field names, so a UI can pass
/// its slider state through as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSpec {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub blur: Option<f32>,
    pub grayscale: bool,
    pub sepia: bool,
}

const MAX_PERCENT: f32 = 200.0;
const MAX_BLUR_RADIUS: f32 = 10.0;

impl FilterSpec {
    pub(crate) fn brightness_factor(&self) -> f32 {
        percent_factor(self.brightness)
    }

    pub(crate) fn contrast_factor(&self) -> f32 {
        percent_factor(self.contrast)
    }

    pub(crate) fn saturation_factor(&self) -> f32 {
        percent_factor(self.saturation)
    }

    pub(crate) fn blur_radius(&self) -> f32 {
        match self.blur {
            Some(r) if r.is_finite() => r.clamp(0.0, MAX_BLUR_RADIUS),
            _ => 0.0,
        }
    }

    /// True when applying this spec cannot change any pixel.
    pub fn is_identity(&self) -> bool {
        !self.has_tonal_steps() && self.blur_radius() == 0.0
    }

    pub(crate) fn has_tonal_steps(&self) -> bool {
        self.brightness_factor() != 1.0
            || self.contrast_factor() != 1.0
            || self.saturation_factor() != 1.0
            || self.grayscale
            || self.sepia
    }
}

fn percent_factor(value: Option<f32>) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, MAX_PERCENT) / 100.0,
        _ => 1.0,
    }
}

/// An opaque 8-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            6 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Some(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => None,
        }
    }
}

/// What to draw behind the foreground when compositing.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Keep the mask as the alpha channel; draw nothing behind.
    Transparent,
    SolidColor(Rgb),
    /// Stretched to the foreground's size, ignoring its aspect ratio.
    ImageFill(Bitmap),
}
