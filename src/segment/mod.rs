//! Foreground/background segmentation.
//!
//! Two interchangeable strategies produce an [`AlphaMask`] at the source
//! image's resolution:
//!
//! | Strategy | Type | Cost | Can fail |
//! |---|---|---|---|
//! | Corner-color distance | [`HeuristicColorDistance`] | one pass, no model | no |
//! | Learned alpha matte | [`LearnedAlphaMatte`] | model load + inference | `ModelLoadFailed`, `SegmentationFailed` |
//!
//! Both implement [`Segmenter`]; [`SegmenterKind`] is the tagged variant a
//! caller picks from configuration. Nothing downstream (the compositor, the
//! pipelines in [`operations`](crate::imaging::operations)) knows which one
//! produced a mask.
//!
//! Long-running work reports [`Phase`]s to a [`ProgressSink`]. Sinks are
//! notified in order and never acknowledge.

pub mod heuristic;
pub mod learned;

pub use heuristic::HeuristicColorDistance;
pub use learned::{AlphaMatteModel, LearnedAlphaMatte, ModelLoader, ModelSlot};

use crate::config::{SegmentationConfig, SegmentationStrategy};
use crate::error::{EngineError, Result};
use crate::imaging::{AlphaMask, Bitmap};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Steps of a segmentation run, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    LoadingModel,
    Analyzing,
    Removing,
    ResizingMask,
    Finalizing,
}

impl Phase {
    /// Short label for display. Not meant to be parsed.
    pub fn label(self) -> &'static str {
        match self {
            Self::LoadingModel => "Loading model…",
            Self::Analyzing => "Analyzing background…",
            Self::Removing => "Removing background…",
            Self::ResizingMask => "Resizing mask…",
            Self::Finalizing => "Finalizing…",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives progress notifications. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: Phase);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _phase: Phase) {}
}

/// Records every phase it is told about, in order.
#[derive(Debug, Default)]
pub struct ProgressLog {
    phases: Mutex<Vec<Phase>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, phase: Phase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(phase);
    }
}

/// Event-stream sink. A dropped receiver just means nobody is listening.
impl ProgressSink for tokio::sync::mpsc::UnboundedSender<Phase> {
    fn report(&self, phase: Phase) {
        let _ = self.send(phase);
    }
}

/// A background segmentation strategy.
///
/// The returned mask always has `image`'s dimensions, whatever resolution the
/// strategy worked at internally.
///
/// Only model loading actually suspends. The pixel work and model inference
/// run synchronously inside `segment` on whatever thread polls it, and
/// inference can take seconds. Inside a tokio runtime, drive the call from
/// `tokio::task::spawn_blocking` (with `Handle::block_on`) or a dedicated
/// thread rather than a core worker.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    async fn segment(&self, image: &Bitmap, progress: &dyn ProgressSink) -> Result<AlphaMask>;
}

/// The strategy chosen at configuration time.
#[derive(Debug, Clone)]
pub enum SegmenterKind {
    Heuristic(HeuristicColorDistance),
    Learned(LearnedAlphaMatte),
}

impl SegmenterKind {
    /// Build the configured strategy.
    ///
    /// The learned strategy loads its model through `loader` into the
    /// process-wide [`ModelSlot::global`]; asking for it without a loader is
    /// a `ModelLoadFailed`.
    pub fn from_config(
        config: &SegmentationConfig,
        loader: Option<Arc<dyn ModelLoader>>,
    ) -> Result<Self> {
        match config.strategy {
            SegmentationStrategy::Heuristic => {
                Ok(Self::Heuristic(HeuristicColorDistance::from_config(config)))
            }
            SegmentationStrategy::Learned => {
                let loader = loader.ok_or_else(|| {
                    EngineError::ModelLoadFailed(
                        "learned segmentation selected but no model loader was provided".into(),
                    )
                })?;
                Ok(Self::Learned(
                    LearnedAlphaMatte::new(loader)
                        .with_max_working_dimension(config.max_working_dimension),
                ))
            }
        }
    }
}

#[async_trait]
impl Segmenter for SegmenterKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Heuristic(s) => s.name(),
            Self::Learned(s) => s.name(),
        }
    }

    async fn segment(&self, image: &Bitmap, progress: &dyn ProgressSink) -> Result<AlphaMask> {
        match self {
            Self::Heuristic(s) => s.segment(image, progress).await,
            Self::Learned(s) => s.segment(image, progress).await,
        }
    }
}
