use ndarray::{Array, ArrayD, IxDyn};
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Name and declared shape of one model output. Dynamic axes are `<= 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub name: String,
    pub shape: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub input_name: String,
    pub input_width: u32,
    pub input_height: u32,
    /// In declaration order; `infer` returns tensors in the same order.
    pub outputs: Vec<OutputInfo>,
}

impl ModelMetadata {
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }
}

pub trait InferenceBackend {
    fn load_model(path: &Path, use_acceleration: bool) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn metadata(&self) -> &ModelMetadata;

    /// Run one NCHW batch and return every output, in metadata order.
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<Vec<ArrayD<f32>>>;
}
