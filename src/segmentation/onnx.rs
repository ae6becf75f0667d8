use super::preprocess::{BlobParams, Preprocessor};
use super::types::{Backend, ScoreVolume, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Options for building an [`OnnxSegmenter`].
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Model input resolution (width, height)
    pub input_size: (u32, u32),
    /// Use CUDA when a compatible device is present
    pub prefer_cuda: bool,
    pub blob: BlobParams,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            input_size: (500, 500),
            prefer_cuda: true,
            blob: BlobParams::default(),
        }
    }
}

/// Fully convolutional segmentation network served by ONNX Runtime.
///
/// The model takes one `[1, 3, H, W]` image blob and its first output is
/// the per-class score tensor `[1, classes, H, W]`.
pub struct OnnxSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    backend: Backend,
}

impl OnnxSegmenter {
    /// Create a new segmenter from an ONNX file
    ///
    /// CUDA is registered only when preferred and actually available,
    /// otherwise the session runs on the default CPU provider.
    pub fn new<P: AsRef<Path>>(model_path: P, options: ModelOptions) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading segmentation model from {}", path.display());

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        let backend = if options.prefer_cuda && cuda_available() {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])?;
            Backend::Cuda
        } else {
            Backend::Cpu
        };

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Segmentation model loaded, {}", backend.indicator());

        let (width, height) = options.input_size;
        let preprocessor = Preprocessor::new(width, height, options.blob);
        let (width, height) = preprocessor.target_size();
        tracing::info!("Model input blob: 1x3x{}x{}", height, width);

        Ok(Self {
            session,
            preprocessor,
            backend,
        })
    }
}

fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            tracing::debug!("CUDA availability check failed: {}", e);
            false
        }
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn infer(&mut self, frame: &RgbImage) -> Result<ScoreVolume> {
        let _span = tracing::debug_span!("onnx_infer").entered();

        let blob = self.preprocessor.preprocess(frame);
        let input = Tensor::from_array(blob).context("Failed to build input tensor")?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let scores = outputs[0]
            .try_extract_array::<f32>()
            .context("Model output is not an f32 tensor")?
            .to_owned();

        let volume = ScoreVolume::from_dyn(scores)?;
        tracing::debug!(
            "Scores: {} classes at {}x{}",
            volume.num_classes(),
            volume.width(),
            volume.height()
        );
        Ok(volume)
    }

    fn backend(&self) -> Option<Backend> {
        Some(self.backend)
    }
}
