use crate::error::{DetectorError, Result};
use crate::processing::{AnchorGrid, DecoderKind, LabelCatalog};
use common::{env_flag, env_or};
use std::env;
use std::path::PathBuf;

pub use common::Environment;

pub const DEFAULT_OBJECTNESS_CONFIDENCE: f32 = 0.20;
pub const DEFAULT_CLASS_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.45;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub environment: Environment,
    pub model_path: PathBuf,
    /// Custom labels in output order; `None` uses COCO.
    pub labels: Option<Vec<String>>,
    pub use_acceleration: bool,
    pub objectness_confidence: f32,
    pub class_confidence: f32,
    pub overlap_threshold: f32,
    /// Forces a decoder instead of inferring one from the model outputs.
    pub decoder: Option<DecoderKind>,
    pub anchors: AnchorGrid,
    pub otel_endpoint: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            model_path: PathBuf::from("models/yolov5s.onnx"),
            labels: None,
            use_acceleration: false,
            objectness_confidence: DEFAULT_OBJECTNESS_CONFIDENCE,
            class_confidence: DEFAULT_CLASS_CONFIDENCE,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            decoder: None,
            anchors: AnchorGrid::default(),
            otel_endpoint: None,
        }
    }
}

impl DetectorConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let labels = match env::var("LABELS_FILE") {
            Ok(path) if !path.trim().is_empty() => Some(
                LabelCatalog::from_file(path.trim())?
                    .iter()
                    .map(|label| label.name.to_string())
                    .collect(),
            ),
            _ => env::var("LABELS").ok().map(|list| parse_label_list(&list)),
        };

        let decoder = match env::var("DECODER") {
            Ok(name) if !name.trim().is_empty() => Some(name.parse::<DecoderKind>()?),
            _ => None,
        };

        let otel_endpoint = env::var("OTEL_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());

        Ok(Self {
            environment: Environment::from_env(),
            model_path,
            labels,
            use_acceleration: env_flag("USE_ACCELERATION", defaults.use_acceleration),
            objectness_confidence: env_or("OBJECTNESS_CONFIDENCE", defaults.objectness_confidence),
            class_confidence: env_or("CLASS_CONFIDENCE", defaults.class_confidence),
            overlap_threshold: env_or("OVERLAP_THRESHOLD", defaults.overlap_threshold),
            decoder,
            anchors: defaults.anchors,
            otel_endpoint,
        })
    }

    pub fn label_catalog(&self) -> LabelCatalog {
        match &self.labels {
            Some(labels) => LabelCatalog::from_names(labels),
            None => LabelCatalog::coco(),
        }
    }

    pub fn validate_thresholds(&self) -> Result<()> {
        let thresholds = [
            ("objectness_confidence", self.objectness_confidence),
            ("class_confidence", self.class_confidence),
            ("overlap_threshold", self.overlap_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(DetectorError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

fn parse_label_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
