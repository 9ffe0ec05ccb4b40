pub mod config;
pub mod cpu;

use ndarray::{Array, IxDyn};

pub use config::{DEFAULT_INPUT_SIZE, LETTERBOX_COLOR};
pub use cpu::CpuPreProcessor;

/// How the source image is fitted into the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Aspect-preserving scale, centred, remainder filled with [`LETTERBOX_COLOR`].
    #[default]
    Letterbox,
    /// Independent scale per axis, no padding.
    Stretch,
}

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// NCHW tensor, RGB, values in [0, 1]
    pub data: Array<f32, IxDyn>,
    /// Horizontal scale factor applied (equal to `scale_y` when letterboxing)
    pub scale_x: f32,
    /// Vertical scale factor applied
    pub scale_y: f32,
    /// X offset of the resized image inside the input (in pixels)
    pub offset_x: f32,
    /// Y offset of the resized image inside the input (in pixels)
    pub offset_y: f32,
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Preprocess an image for inference
    ///
    /// # Arguments
    /// * `pixels` - RGB pixel data in HWC format
    /// * `width` - Image width
    /// * `height` - Image height
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}
