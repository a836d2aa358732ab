//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory_with_format` (PNG, JPEG, WebP, TIFF) |
//! | **Encode** | `PngEncoder`, `JpegEncoder` (quality), `WebPEncoder` (lossless) |
//! | **Resize** | `imageops::resize` with Lanczos3 |
//! | **Filters** | per-pixel `f32` math over rayon row chunks, `imageops::blur` |
//! | **Composite** | per-pixel blend over rayon row chunks |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and size math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Stages**: [`codec`], [`geometry`], [`filters`], [`compositor`], each a
//!   function from bitmap to bitmap (or bytes)
//! - **Operations**: Bytes-in/bytes-out pipelines combining the stages

mod bitmap;
mod calculations;
pub mod codec;
pub mod compositor;
pub mod filters;
pub mod geometry;
pub mod operations;
mod params;

pub use bitmap::{AlphaMask, Bitmap};
pub use calculations::{
    calculate_fit_dimensions, calculate_working_dimensions, format_file_size,
    size_reduction_percent,
};
pub use codec::{EncodedImage, SourceFormat, decode, encode, sniff_format};
pub use compositor::composite;
pub use filters::apply_filters;
pub use geometry::{resize, resize_exact, resize_mask};
pub use operations::{
    ImageEngine, apply_filter_to_image, compress, convert_format, cut_out, remove_background,
    resize_image,
};
pub use params::{Background, EncodeRequest, FilterSpec, OutputFormat, Quality, Rgb};
