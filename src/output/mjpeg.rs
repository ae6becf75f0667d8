use super::{fit_frame, FrameSink};
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Persistent output: a raw Motion-JPEG stream (concatenated JPEG frames)
/// at a fixed resolution. The frame rate is nominal, players take it as an
/// argument (`ffmpeg -framerate <fps> -i out.mjpeg`).
pub struct MjpegWriter {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    fps: f64,
    quality: u8,
    frames: u64,
}

impl MjpegWriter {
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, fps: f64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;

        tracing::info!(
            "Writing {}x{} MJPEG stream at {} fps to {}",
            width,
            height,
            fps,
            path.display()
        );

        Ok(Self {
            writer: BufWriter::new(file),
            width,
            height,
            fps,
            quality: 90,
            frames: 0,
        })
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSink for MjpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let frame = fit_frame(frame, self.width, self.height);

        JpegEncoder::new_with_quality(&mut self.writer, self.quality)
            .encode_image(frame.as_ref())
            .context("Failed to encode frame")?;
        self.writer.flush().context("Failed to write frame")?;
        self.frames += 1;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for MjpegWriter {
    fn drop(&mut self) {
        tracing::info!("Closed MJPEG stream after {} frames", self.frames);
    }
}
