use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error(
        "Number of labels ({labels}) exceeds model output dimension: {labels} + 4 > {output_dimension}"
    )]
    LabelCapacity {
        labels: usize,
        output_dimension: usize,
    },

    #[error("Failed to read label file {}: {source}", .path.display())]
    LabelFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported model output layout: {0}")]
    UnsupportedLayout(String),

    #[error("Dynamic output dimension in {output}: {shape:?}")]
    DynamicDimension { output: String, shape: Vec<i64> },

    #[error("Threshold {name} must be finite, got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("Unknown decoder: {0}")]
    UnknownDecoder(String),

    #[error("Output tensor {index} has shape {shape:?}, expected {expected}")]
    TensorShape {
        index: usize,
        shape: Vec<usize>,
        expected: String,
    },

    #[error("Preprocessing failed: {0:#}")]
    Preprocess(anyhow::Error),

    #[error("Inference backend error: {0:#}")]
    Backend(anyhow::Error),
}

impl DetectorError {
    /// Raised while building the detector rather than per prediction.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::LabelCapacity { .. }
                | Self::LabelFile { .. }
                | Self::UnsupportedLayout(_)
                | Self::DynamicDimension { .. }
                | Self::InvalidThreshold { .. }
                | Self::UnknownDecoder(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;
