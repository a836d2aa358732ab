//! Model-based alpha matting.
//!
//! The model itself is injected: an [`AlphaMatteModel`] runs inference on an
//! NCHW tensor, and a [`ModelLoader`] produces one asynchronously (fetching
//! weights, building a runtime session, whatever the backend needs). This
//! crate owns everything around it:
//!
//! 1. **Load once**: the model lives in a [`ModelSlot`]. Concurrent callers
//!    wait on the same in-flight load; a failed load leaves the slot empty
//!    so the next call tries again.
//! 2. **Preprocess**: downscale to the working resolution if needed, then
//!    build a `[1, 3, h, w]` tensor of RGB normalised to `[-1, 1]`.
//! 3. **Infer**: the model returns `[1, 1, h', w']` alpha in `[0, 1]`.
//! 4. **Postprocess**: quantise to 8 bits and resample to the source size.

use super::heuristic::DEFAULT_MAX_WORKING_DIMENSION;
use super::{Phase, ProgressSink, Segmenter};
use crate::error::{EngineError, Result};
use crate::imaging::geometry::{resize_mask, working_copy};
use crate::imaging::{AlphaMask, Bitmap};
use async_trait::async_trait;
use ndarray::{Array4, s};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;

/// A loaded foreground/background matting network.
pub trait AlphaMatteModel: Send + Sync {
    /// Model identifier for logs.
    fn name(&self) -> &str;

    /// Run inference. Called synchronously from [`Segmenter::segment`].
    ///
    /// `input` is `[1, 3, height, width]`, RGB, each channel mapped to
    /// `(v / 255 - 0.5) / 0.5`. The result must be `[1, 1, h, w]` with alpha
    /// in `[0, 1]`; `h` and `w` need not match the input.
    fn predict(&self, input: Array4<f32>) -> Result<Array4<f32>>;
}

/// Produces a model. Called at most once per successful load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn AlphaMatteModel>>;
}

static GLOBAL_SLOT: LazyLock<Arc<ModelSlot>> = LazyLock::new(|| Arc::new(ModelSlot::new()));

/// Lazily initialised holder for a loaded model.
#[derive(Default)]
pub struct ModelSlot {
    model: OnceCell<Arc<dyn AlphaMatteModel>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot.
    pub fn global() -> Arc<ModelSlot> {
        Arc::clone(&GLOBAL_SLOT)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// The loaded model, loading it through `loader` on first use.
    ///
    /// Any loader error surfaces as `ModelLoadFailed` and leaves the slot
    /// empty.
    pub async fn get_or_load(&self, loader: &dyn ModelLoader) -> Result<Arc<dyn AlphaMatteModel>> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!("Loading matting model");
                match loader.load().await {
                    Ok(model) => {
                        tracing::info!(model = model.name(), "Matting model loaded");
                        Ok(model)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Matting model failed to load");
                        Err(match e {
                            EngineError::ModelLoadFailed(_) => e,
                            other => EngineError::ModelLoadFailed(other.to_string()),
                        })
                    }
                }
            })
            .await
            .cloned()
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded = self.model.get().map(|m| m.name().to_string());
        f.debug_struct("ModelSlot").field("model", &loaded).finish()
    }
}

/// Segmentation through an injected matting model.
#[derive(Clone)]
pub struct LearnedAlphaMatte {
    loader: Arc<dyn ModelLoader>,
    slot: Arc<ModelSlot>,
    max_working_dimension: u32,
}

impl LearnedAlphaMatte {
    /// Uses the process-wide [`ModelSlot::global`].
    ///
    /// The slot holds one model for the whole process. Whichever instance
    /// loads first wins: every later `LearnedAlphaMatte::new` shares that
    /// model and its own `loader` is never called. Use [`with_slot`] with a
    /// separate [`ModelSlot`] to run a different model side by side.
    ///
    /// [`with_slot`]: Self::with_slot
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self::with_slot(loader, ModelSlot::global())
    }

    pub fn with_slot(loader: Arc<dyn ModelLoader>, slot: Arc<ModelSlot>) -> Self {
        Self {
            loader,
            slot,
            max_working_dimension: DEFAULT_MAX_WORKING_DIMENSION,
        }
    }

    pub fn with_max_working_dimension(mut self, max: u32) -> Self {
        self.max_working_dimension = max.max(1);
        self
    }

    pub fn slot(&self) -> &Arc<ModelSlot> {
        &self.slot
    }
}

impl fmt::Debug for LearnedAlphaMatte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnedAlphaMatte")
            .field("slot", &self.slot)
            .field("max_working_dimension", &self.max_working_dimension)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Segmenter for LearnedAlphaMatte {
    fn name(&self) -> &'static str {
        "learned"
    }

    async fn segment(&self, image: &Bitmap, progress: &dyn ProgressSink) -> Result<AlphaMask> {
        progress.report(Phase::LoadingModel);
        let model = self.slot.get_or_load(self.loader.as_ref()).await?;

        progress.report(Phase::Analyzing);
        let working = working_copy(image, self.max_working_dimension)?;
        let analysed = working.as_ref().unwrap_or(image);
        let input = to_input_tensor(analysed);

        progress.report(Phase::Removing);
        tracing::debug!(
            model = model.name(),
            width = analysed.width(),
            height = analysed.height(),
            downscaled = working.is_some(),
            "Running matting inference"
        );
        let prediction = model.predict(input).map_err(|e| match e {
            EngineError::SegmentationFailed(_) => e,
            other => EngineError::SegmentationFailed(other.to_string()),
        })?;
        let mask = prediction_to_mask(&prediction)?;

        progress.report(Phase::ResizingMask);
        resize_mask(&mask, image.width(), image.height())
    }
}

/// `[1, 3, h, w]`, RGB scaled to `[-1, 1]`. Alpha is ignored.
fn to_input_tensor(image: &Bitmap) -> Array4<f32> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let raw = image.as_raw();
    Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
        let v = raw[(y * width + x) * 4 + c] as f32 / 255.0;
        (v - 0.5) / 0.5
    })
}

fn prediction_to_mask(prediction: &Array4<f32>) -> Result<AlphaMask> {
    let shape = prediction.shape();
    if shape[0] != 1 || shape[1] != 1 {
        return Err(EngineError::SegmentationFailed(format!(
            "model returned shape {shape:?}, expected [1, 1, h, w]"
        )));
    }
    if shape[2] == 0 || shape[3] == 0 {
        return Err(EngineError::SegmentationFailed(format!(
            "model returned an empty prediction of shape {shape:?}"
        )));
    }

    let plane = prediction.slice(s![0, 0, .., ..]);
    if plane.iter().any(|a| !a.is_finite()) {
        return Err(EngineError::SegmentationFailed(
            "model returned non-finite alpha values".into(),
        ));
    }

    let (height, width) = (shape[2], shape[3]);
    let to_u32 = |v: usize| {
        u32::try_from(v).map_err(|_| {
            EngineError::SegmentationFailed(format!("prediction dimension {v} is too large"))
        })
    };
    let values = plane
        .iter()
        .map(|a| (a.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    AlphaMask::from_raw(to_u32(width)?, to_u32(height)?, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{NoProgress, ProgressLog};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Foreground wherever red dominates, at the input's own resolution.
    struct RedIsForeground;

    impl AlphaMatteModel for RedIsForeground {
        fn name(&self) -> &str {
            "red-is-foreground"
        }

        fn predict(&self, input: Array4<f32>) -> Result<Array4<f32>> {
            let (h, w) = (input.shape()[2], input.shape()[3]);
            Ok(Array4::from_shape_fn((1, 1, h, w), |(_, _, y, x)| {
                if input[[0, 0, y, x]] > 0.0 { 1.0 } else { 0.0 }
            }))
        }
    }

    /// Always answers with a fixed-size prediction.
    struct FixedOutput {
        value: f32,
        size: (usize, usize),
        channels: usize,
    }

    impl AlphaMatteModel for FixedOutput {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict(&self, _input: Array4<f32>) -> Result<Array4<f32>> {
            Ok(Array4::from_elem(
                (1, self.channels, self.size.1, self.size.0),
                self.value,
            ))
        }
    }

    struct BrokenModel;

    impl AlphaMatteModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        fn predict(&self, _input: Array4<f32>) -> Result<Array4<f32>> {
            Err(EngineError::Decode("tensor backend exploded".into()))
        }
    }

    /// Counts load attempts; fails the first `failures` of them.
    struct CountingLoader {
        attempts: AtomicUsize,
        failures: usize,
        delay: Duration,
        model: Arc<dyn AlphaMatteModel>,
    }

    impl CountingLoader {
        fn new(model: Arc<dyn AlphaMatteModel>) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                failures: 0,
                delay: Duration::ZERO,
                model,
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn AlphaMatteModel>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if attempt < self.failures {
                return Err(EngineError::ModelLoadFailed("weights unavailable".into()));
            }
            Ok(Arc::clone(&self.model))
        }
    }

    fn red_square(width: u32, height: u32) -> Bitmap {
        Bitmap::from_fn(width, height, |x, y| {
            if x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4 {
                [230, 10, 10, 255]
            } else {
                [10, 10, 230, 255]
            }
        })
        .unwrap()
    }

    fn strategy(loader: Arc<CountingLoader>) -> LearnedAlphaMatte {
        LearnedAlphaMatte::with_slot(loader, Arc::new(ModelSlot::new()))
    }

    #[tokio::test]
    async fn segments_with_injected_model() {
        let loader = Arc::new(CountingLoader::new(Arc::new(RedIsForeground)));
        let mask = strategy(loader)
            .segment(&red_square(40, 20), &NoProgress)
            .await
            .unwrap();

        assert_eq!(mask.dimensions(), (40, 20));
        assert_eq!(mask.value(20, 10), 255);
        assert_eq!(mask.value(1, 1), 0);
    }

    #[tokio::test]
    async fn reports_phases_in_order() {
        let loader = Arc::new(CountingLoader::new(Arc::new(RedIsForeground)));
        let log = ProgressLog::new();
        strategy(loader)
            .segment(&red_square(8, 8), &log)
            .await
            .unwrap();

        assert_eq!(
            log.phases(),
            vec![
                Phase::LoadingModel,
                Phase::Analyzing,
                Phase::Removing,
                Phase::ResizingMask,
            ]
        );
    }

    #[tokio::test]
    async fn prediction_is_resized_to_source() {
        let model = Arc::new(FixedOutput {
            value: 0.5,
            size: (32, 32),
            channels: 1,
        });
        let loader = Arc::new(CountingLoader::new(model));
        let mask = strategy(loader)
            .segment(&red_square(300, 120), &NoProgress)
            .await
            .unwrap();

        assert_eq!(mask.dimensions(), (300, 120));
        assert!(mask.as_raw().iter().all(|&v| v == 128));
    }

    #[tokio::test]
    async fn oversized_input_reaches_model_downscaled() {
        struct ShapeProbe(std::sync::Mutex<Vec<usize>>);

        impl AlphaMatteModel for ShapeProbe {
            fn name(&self) -> &str {
                "probe"
            }

            fn predict(&self, input: Array4<f32>) -> Result<Array4<f32>> {
                *self.0.lock().unwrap() = input.shape().to_vec();
                let (h, w) = (input.shape()[2], input.shape()[3]);
                Ok(Array4::ones((1, 1, h, w)))
            }
        }

        let probe = Arc::new(ShapeProbe(std::sync::Mutex::new(Vec::new())));
        let loader = Arc::new(CountingLoader::new(probe.clone()));
        let image = Bitmap::filled(2000, 1000, [1, 2, 3, 255]).unwrap();
        let mask = strategy(loader).segment(&image, &NoProgress).await.unwrap();

        assert_eq!(*probe.0.lock().unwrap(), vec![1, 3, 512, 1024]);
        assert_eq!(mask.dimensions(), (2000, 1000));
    }

    #[tokio::test]
    async fn model_is_loaded_once_across_calls() {
        let loader = Arc::new(CountingLoader::new(Arc::new(RedIsForeground)));
        let segmenter = strategy(loader.clone());
        for _ in 0..3 {
            segmenter.segment(&red_square(8, 8), &NoProgress).await.unwrap();
        }
        assert_eq!(loader.attempts(), 1);
        assert!(segmenter.slot().is_loaded());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_load() {
        let loader = Arc::new(CountingLoader {
            delay: Duration::from_millis(50),
            ..CountingLoader::new(Arc::new(RedIsForeground))
        });
        let segmenter = strategy(loader.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let segmenter = segmenter.clone();
                tokio::spawn(async move {
                    segmenter.segment(&red_square(16, 16), &NoProgress).await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(loader.attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn segmentation_runs_on_a_blocking_thread() {
        let loader = Arc::new(CountingLoader::new(Arc::new(RedIsForeground)));
        let segmenter = strategy(loader.clone());
        let handle = tokio::runtime::Handle::current();

        let mask = tokio::task::spawn_blocking(move || {
            handle.block_on(segmenter.segment(&red_square(16, 16), &NoProgress))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(mask.dimensions(), (16, 16));
        assert_eq!(mask.value(8, 8), 255);
        assert_eq!(loader.attempts(), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_call() {
        let loader = Arc::new(CountingLoader {
            failures: 1,
            ..CountingLoader::new(Arc::new(RedIsForeground))
        });
        let segmenter = strategy(loader.clone());

        let first = segmenter.segment(&red_square(8, 8), &NoProgress).await;
        assert!(matches!(first, Err(EngineError::ModelLoadFailed(_))));
        assert!(!segmenter.slot().is_loaded());

        let second = segmenter.segment(&red_square(8, 8), &NoProgress).await;
        assert!(second.is_ok());
        assert_eq!(loader.attempts(), 2);
    }

    #[tokio::test]
    async fn loader_errors_become_model_load_failed() {
        struct Offline;

        #[async_trait]
        impl ModelLoader for Offline {
            async fn load(&self) -> Result<Arc<dyn AlphaMatteModel>> {
                Err(EngineError::Decode("corrupt weights".into()))
            }
        }

        let slot = ModelSlot::new();
        let result = slot.get_or_load(&Offline).await;
        assert!(matches!(result, Err(EngineError::ModelLoadFailed(msg)) if msg.contains("corrupt")));
    }

    #[tokio::test]
    async fn inference_errors_fail_the_call() {
        let loader = Arc::new(CountingLoader::new(Arc::new(BrokenModel)));
        let result = strategy(loader)
            .segment(&red_square(8, 8), &NoProgress)
            .await;
        assert!(matches!(result, Err(EngineError::SegmentationFailed(msg)) if msg.contains("exploded")));
    }

    #[tokio::test]
    async fn non_finite_prediction_fails_instead_of_guessing() {
        let model = Arc::new(FixedOutput {
            value: f32::NAN,
            size: (4, 4),
            channels: 1,
        });
        let loader = Arc::new(CountingLoader::new(model));
        let result = strategy(loader)
            .segment(&red_square(8, 8), &NoProgress)
            .await;
        assert!(matches!(result, Err(EngineError::SegmentationFailed(_))));
    }

    #[tokio::test]
    async fn empty_prediction_fails() {
        let model = Arc::new(FixedOutput {
            value: 1.0,
            size: (0, 4),
            channels: 1,
        });
        let loader = Arc::new(CountingLoader::new(model));
        let result = strategy(loader)
            .segment(&red_square(8, 8), &NoProgress)
            .await;
        assert!(matches!(result, Err(EngineError::SegmentationFailed(_))));
    }

    #[tokio::test]
    async fn multi_channel_prediction_fails() {
        let model = Arc::new(FixedOutput {
            value: 1.0,
            size: (4, 4),
            channels: 3,
        });
        let loader = Arc::new(CountingLoader::new(model));
        let result = strategy(loader)
            .segment(&red_square(8, 8), &NoProgress)
            .await;
        assert!(matches!(result, Err(EngineError::SegmentationFailed(msg)) if msg.contains("[1, 3, 4, 4]")));
    }

    #[test]
    fn only_single_plane_predictions_are_accepted() {
        for shape in [(1, 3, 4, 4), (2, 1, 4, 4), (1, 0, 4, 4)] {
            let prediction = Array4::from_elem(shape, 1.0);
            assert!(
                matches!(
                    prediction_to_mask(&prediction),
                    Err(EngineError::SegmentationFailed(_))
                ),
                "shape {shape:?} should be rejected"
            );
        }
        let mask = prediction_to_mask(&Array4::from_elem((1, 1, 4, 4), 1.0)).unwrap();
        assert_eq!(mask.dimensions(), (4, 4));
    }

    #[test]
    fn default_constructor_shares_the_process_wide_slot() {
        let first = LearnedAlphaMatte::new(Arc::new(CountingLoader::new(Arc::new(RedIsForeground))));
        let second = LearnedAlphaMatte::new(Arc::new(CountingLoader::new(Arc::new(BrokenModel))));
        assert!(Arc::ptr_eq(first.slot(), second.slot()));
        assert!(Arc::ptr_eq(first.slot(), &ModelSlot::global()));
    }

    #[test]
    fn input_tensor_is_normalised_nchw() {
        let image = Bitmap::from_fn(3, 2, |x, _| {
            if x == 2 { [255, 0, 51, 7] } else { [0, 255, 0, 255] }
        })
        .unwrap();
        let tensor = to_input_tensor(&image);

        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 2]], -1.0);
        assert!((tensor[[0, 2, 0, 2]] - (-0.6)).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 0, 0]], 1.0);
    }

    #[test]
    fn prediction_quantises_and_clamps() {
        let prediction =
            Array4::from_shape_vec((1, 1, 1, 4), vec![-0.5, 0.0, 0.5, 1.7]).unwrap();
        let mask = prediction_to_mask(&prediction).unwrap();
        assert_eq!(mask.as_raw(), &[0, 0, 128, 255]);
    }
}
