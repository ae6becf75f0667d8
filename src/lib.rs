//! Real-time semantic segmentation overlay: decode per-class scores into a
//! label mask, colorize it, blend it over the frame and annotate the result.

pub mod capture;
pub mod error;
pub mod labels;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod segmentation;

pub use error::{Error, Result};
pub use labels::{Label, LabelTable};
pub use pipeline::{FrameCounters, FramePipeline, PipelineConfig, PipelineState, StopSignal};
