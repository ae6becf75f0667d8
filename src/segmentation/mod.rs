mod decoder;
mod onnx;
mod preprocess;
pub mod types;

pub use decoder::ScoreDecoder;
pub use onnx::{ModelOptions, OnnxSegmenter};
pub use preprocess::{BlobParams, ChannelOrder, Preprocessor};
pub use types::{Backend, LabelMask, ScoreVolume, SegmentationModel};

use anyhow::Result;
use std::path::Path;

/// Create the default segmentation model (ONNX Runtime)
pub fn create_default_model<P: AsRef<Path>>(
    model_path: P,
    options: ModelOptions,
) -> Result<Box<dyn SegmentationModel>> {
    let model = OnnxSegmenter::new(model_path, options)?;
    Ok(Box::new(model))
}
