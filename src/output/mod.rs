mod loopback;
mod mjpeg;

pub use loopback::V4L2Output;
pub use mjpeg::MjpegWriter;

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait FrameSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}

/// Scale a frame to the sink resolution when it differs.
fn fit_frame(frame: &RgbImage, width: u32, height: u32) -> std::borrow::Cow<'_, RgbImage> {
    if frame.dimensions() == (width, height) {
        std::borrow::Cow::Borrowed(frame)
    } else {
        std::borrow::Cow::Owned(image::imageops::resize(
            frame,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}
