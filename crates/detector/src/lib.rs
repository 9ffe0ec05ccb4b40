pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, ModelMetadata, OutputInfo};
pub use config::DetectorConfig;
pub use detector::Detector;
pub use error::{DetectorError, Result};
pub use processing::{
    AnchorGrid, Candidate, DecoderKind, GainMode, GeometryTransform, Label, LabelCatalog,
    Prediction, Rect,
};
