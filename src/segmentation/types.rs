use crate::error::{Error, Result};
use anyhow::Result as AnyResult;
use image::{GrayImage, RgbImage};
use ndarray::{Array3, Array4, ArrayD, ArrayView2, Axis, Ix4};

/// Per-pixel winning class id, row-major, one byte per pixel.
pub type LabelMask = GrayImage;

/// Raw class activations for one frame, shape `[classes, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVolume {
    scores: Array3<f32>,
}

impl ScoreVolume {
    pub fn new(scores: Array3<f32>) -> Self {
        Self { scores }
    }

    /// Build from a flat `[classes * height * width]` buffer in channel-major order.
    pub fn from_shape_vec(shape: (usize, usize, usize), data: Vec<f32>) -> Result<Self> {
        let scores = Array3::from_shape_vec(shape, data)
            .map_err(|e| Error::InvalidInput(format!("score buffer does not match {:?}: {}", shape, e)))?;
        Ok(Self { scores })
    }

    /// Strip the batch axis of a model output shaped `[1, classes, height, width]`.
    pub fn from_batched(batched: Array4<f32>) -> Result<Self> {
        let batch = batched.len_of(Axis(0));
        if batch != 1 {
            return Err(Error::InvalidInput(format!(
                "expected a single-image batch, got batch size {}",
                batch
            )));
        }
        Ok(Self {
            scores: batched.index_axis_move(Axis(0), 0),
        })
    }

    /// Accept a dynamically shaped model output, which must be 4-dimensional.
    pub fn from_dyn(scores: ArrayD<f32>) -> Result<Self> {
        let shape = scores.shape().to_vec();
        let batched = scores.into_dimensionality::<Ix4>().map_err(|_| {
            Error::InvalidInput(format!(
                "expected scores shaped [1, classes, height, width], got {:?}",
                shape
            ))
        })?;
        Self::from_batched(batched)
    }

    pub fn num_classes(&self) -> usize {
        self.scores.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.scores.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.scores.len_of(Axis(2))
    }

    /// Bounds-checked `(channel, row, col)` access.
    pub fn get(&self, channel: usize, row: usize, col: usize) -> Option<f32> {
        self.scores.get((channel, row, col)).copied()
    }

    /// All scores of one class as a `[height, width]` view.
    ///
    /// # Panics
    /// If `channel >= self.num_classes()`.
    pub fn channel(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.scores.index_axis(Axis(0), channel)
    }
}

/// Compute path a model runs on, shown in the frame overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cuda,
    Cpu,
}

impl Backend {
    pub fn indicator(&self) -> &'static str {
        match self {
            Backend::Cuda => "using GPUs",
            Backend::Cpu => "using CPUs",
        }
    }
}

/// Trait for segmentation models
/// Allows swapping the inference engine without touching the pipeline.
pub trait SegmentationModel {
    /// Run the model on a frame already scaled to the processing resolution.
    ///
    /// # Returns
    /// * Per-class scores for every output pixel
    fn infer(&mut self, frame: &RgbImage) -> AnyResult<ScoreVolume>;

    /// Compute path in use, if the engine exposes it.
    fn backend(&self) -> Option<Backend> {
        None
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn infer(&mut self, frame: &RgbImage) -> AnyResult<ScoreVolume> {
        (**self).infer(frame)
    }

    fn backend(&self) -> Option<Backend> {
        (**self).backend()
    }
}
