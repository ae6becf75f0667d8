use image::{imageops, RgbImage};
use ndarray::Array4;

/// Channel layout expected by the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// How pixel values are turned into blob values: `(pixel - mean[k]) * scale`.
///
/// `mean` is given in the model's channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobParams {
    pub scale: f32,
    pub mean: [f32; 3],
    pub channel_order: ChannelOrder,
}

impl Default for BlobParams {
    /// Caffe-style input: raw 0-255 values in BGR order.
    fn default() -> Self {
        Self {
            scale: 1.0,
            mean: [0.0; 3],
            channel_order: ChannelOrder::Bgr,
        }
    }
}

/// Preprocessor for converting RGB images to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    params: BlobParams,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32, params: BlobParams) -> Self {
        Self {
            target_width,
            target_height,
            params,
        }
    }

    /// Preprocess an RGB image into an NCHW blob
    ///
    /// Steps:
    /// 1. Resize to target dimensions (skipped when they already match)
    /// 2. Reorder channels, subtract the mean and scale
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let image = if image.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        let order = match self.params.channel_order {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        };

        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for (plane, &source) in order.iter().enumerate() {
                let value = (pixel[source] as f32 - self.params.mean[plane]) * self.params.scale;
                tensor[[0, plane, y as usize, x as usize]] = value;
            }
        }

        tensor
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}
