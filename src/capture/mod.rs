mod sequence;
mod v4l_capture;

pub use sequence::ImageSequence;
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbImage;
use std::path::Path;

/// Static properties of a source, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Trait for frame sources
pub trait FrameSource {
    /// Capture the next frame, `None` once the source is exhausted
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Resolution and frame rate of the source
    fn properties(&self) -> SourceProperties;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).read_frame()
    }

    fn properties(&self) -> SourceProperties {
        (**self).properties()
    }
}

/// Open the configured input: the default camera when `input` is empty,
/// otherwise an image file or a directory of frames.
pub fn open_source(input: &str, camera_index: u32, fps: f64) -> Result<Box<dyn FrameSource>> {
    if input.is_empty() {
        Ok(Box::new(WebcamCapture::new(camera_index)?))
    } else {
        Ok(Box::new(ImageSequence::open(Path::new(input), fps)?))
    }
}
