use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::PredictError;

/// Spatial size the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// NHWC batch of `f32` pixels in the raw 0-255 range.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pixels: Vec<f32>,
    shape: [usize; 4],
}

impl ImageBatch {
    /// Wrap one resized RGB image as a batch of size one.
    pub fn single(image: &image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image.as_raw().iter().map(|&x| x as f32).collect();

        ImageBatch {
            pixels,
            shape: [1, height as usize, width as usize, CHANNELS],
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }
}

pub fn decode(data: &[u8]) -> Result<DynamicImage, PredictError> {
    Ok(image::load_from_memory(data)?)
}

/// Convert to RGB and squash to `INPUT_SIZE` x `INPUT_SIZE`.
pub fn prepare(image: &DynamicImage) -> ImageBatch {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    ImageBatch::single(&resized)
}
