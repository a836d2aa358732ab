//! # Pixel Studio
//!
//! A client-side raster image toolkit: format conversion, compression,
//! resizing, tonal filters, and background removal. Everything runs in
//! process on byte buffers; nothing is uploaded anywhere.
//!
//! # Architecture: Stages Over a Bitmap
//!
//! Every operation decodes once into an RGBA [`Bitmap`](imaging::Bitmap),
//! runs one or more stages over it, and encodes once:
//!
//! ```text
//! bytes ─ decode ─▶ Bitmap ─ resize / filters / segment+composite ─▶ Bitmap ─ encode ─▶ bytes
//! ```
//!
//! Stages are plain functions of their inputs. They never touch the
//! filesystem, never hold global state, and can run concurrently on
//! independent bitmaps. The one exception is the matting model used by
//! learned segmentation, which is loaded once per process and shared.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Codec, resize, filters, compositing, and the bytes-in/bytes-out operations |
//! | [`segment`] | Background segmentation strategies and progress reporting |
//! | [`config`] | `pixel-studio.toml` loading, validation, and merging |
//! | [`error`] | The crate-wide [`EngineError`](error::EngineError) |
//!
//! # Design Decisions
//!
//! ## Strategies, Not Subclasses
//!
//! Background removal has two strategies: a corner-color heuristic that
//! needs nothing but the image, and a learned alpha matte that needs a
//! model. Both implement [`segment::Segmenter`] and both produce an
//! [`AlphaMask`](imaging::AlphaMask) at the source resolution. The
//! compositor only ever sees the mask, so swapping the background (solid
//! color, another image, transparency) never requires segmenting again.
//!
//! ## The Model Is Injected
//!
//! The crate does not bundle an inference runtime. Callers supply a
//! [`segment::ModelLoader`] that produces an [`segment::AlphaMatteModel`];
//! the crate handles caching, preprocessing, and turning the prediction
//! into a mask. Loading is guarded by `tokio::sync::OnceCell`, so
//! concurrent first calls share a single load and a failed load is retried
//! on the next call instead of being cached.
//!
//! ## Bounded Working Resolution
//!
//! Segmentation analyses images at most 1024 px on the longer side (see
//! [`config::SegmentationConfig::max_working_dimension`]) and scales the
//! mask back up with the same Lanczos3 filter used everywhere else. Output
//! is always at the input's full resolution.
//!
//! ## Failures Are Loud
//!
//! Every fallible step returns [`EngineError`](error::EngineError). Nothing
//! falls back silently: a failed model load does not quietly switch to the
//! heuristic, and a failed segmentation never produces an unmasked image.

pub mod config;
pub mod error;
pub mod imaging;
pub mod segment;

pub use error::{EngineError, Result};
