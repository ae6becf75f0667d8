use super::{FrameSource, SourceProperties};
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Live camera source. Never ends on its own; a failed read means the
/// device went away.
pub struct WebcamCapture {
    camera: Camera,
    properties: SourceProperties,
}

impl WebcamCapture {
    pub fn new(device_index: u32) -> Result<Self> {
        tracing::info!("Opening camera {}", device_index);

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(index, requested).context("Cannot open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        let properties = SourceProperties {
            width: resolution.width(),
            height: resolution.height(),
            fps: camera.frame_rate() as f64,
        };

        tracing::info!(
            "Camera opened at {}x{}, {} fps",
            properties.width,
            properties.height,
            properties.fps
        );

        Ok(Self { camera, properties })
    }
}

impl FrameSource for WebcamCapture {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = self
            .camera
            .frame()
            .context("Camera is disconnected")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(Some(decoded))
    }

    fn properties(&self) -> SourceProperties {
        self.properties
    }
}
