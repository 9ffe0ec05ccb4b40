use crate::{
    backend::{InferenceBackend, ModelMetadata},
    config::DetectorConfig,
    error::{DetectorError, Result},
    metrics::DetectorMetrics,
    processing::{
        AnchorGrid, DecodeContext, DecoderKind, GeometryTransform, LabelCatalog, Prediction,
        suppress,
    },
};
use image::RgbImage;
use ndarray::ArrayD;
use preprocess::{CpuPreProcessor, Preprocess};
use std::time::Instant;

/// Runs preprocessing, inference and postprocessing for one model.
///
/// The decoder and label catalog are fixed at construction; nothing else
/// carries over between calls.
pub struct Detector<B: InferenceBackend> {
    backend: B,
    preprocessor: CpuPreProcessor,
    labels: LabelCatalog,
    decoder: DecoderKind,
    anchors: AnchorGrid,
    objectness_confidence: f32,
    class_confidence: f32,
    overlap_threshold: f32,
    metrics: DetectorMetrics,
}

impl<B: InferenceBackend> Detector<B> {
    /// Load the model at `config.model_path` and build a detector around it.
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        tracing::info!(model_path = %config.model_path.display(), "Loading model");
        let backend = B::load_model(&config.model_path, config.use_acceleration)
            .map_err(DetectorError::Backend)?;
        Self::new(backend, config)
    }

    pub fn new(backend: B, config: &DetectorConfig) -> Result<Self> {
        config.validate_thresholds()?;

        let metadata = backend.metadata();
        let labels = config.label_catalog();
        let decoder = match config.decoder {
            Some(decoder) => decoder,
            None => DecoderKind::select(&metadata.outputs, labels.len())?,
        };
        labels.validate(decoder.output_dimension(&metadata.outputs)?)?;

        let preprocessor =
            CpuPreProcessor::with_mode(metadata.input_size(), decoder.gain_mode().into());

        tracing::info!(
            decoder = %decoder,
            forced = config.decoder.is_some(),
            labels = labels.len(),
            input_width = metadata.input_width,
            input_height = metadata.input_height,
            "Detector ready"
        );

        Ok(Self {
            backend,
            preprocessor,
            labels,
            decoder,
            anchors: config.anchors.clone(),
            objectness_confidence: config.objectness_confidence,
            class_confidence: config.class_confidence,
            overlap_threshold: config.overlap_threshold,
            metrics: DetectorMetrics::default(),
        })
    }

    pub fn decoder(&self) -> DecoderKind {
        self.decoder
    }

    pub fn labels(&self) -> &LabelCatalog {
        &self.labels
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn metadata(&self) -> &ModelMetadata {
        self.backend.metadata()
    }

    /// Detect objects in an RGB image. Boxes are in the image's pixels.
    pub fn predict(&mut self, image: &RgbImage) -> Result<Vec<Prediction>> {
        let _s = common::span!("predict");
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let input = {
            let _s = common::span!("preprocess");
            self.preprocessor
                .preprocess(image.as_raw(), width, height)
                .map_err(DetectorError::Preprocess)?
        };

        let outputs = {
            let _s = common::span!("model_inference");
            self.backend
                .infer(&input.data)
                .map_err(DetectorError::Backend)?
        };

        let geometry = self.geometry((width, height));
        debug_assert!(
            (input.offset_x - geometry.pad_x).abs() < 1.0
                && (input.offset_y - geometry.pad_y).abs() < 1.0,
            "preprocess padding ({}, {}) disagrees with decode padding ({}, {})",
            input.offset_x,
            input.offset_y,
            geometry.pad_x,
            geometry.pad_y
        );
        let (candidates, predictions) = self.run_postprocess(&outputs, &geometry)?;

        let elapsed = start.elapsed();
        self.metrics
            .record(self.decoder, elapsed, candidates, predictions.len());
        tracing::debug!(
            width,
            height,
            candidates,
            predictions = predictions.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Prediction complete"
        );

        Ok(predictions)
    }

    /// Decode raw output tensors produced for an image of `image_size`.
    pub fn postprocess(
        &self,
        outputs: &[ArrayD<f32>],
        image_size: (u32, u32),
    ) -> Result<Vec<Prediction>> {
        let geometry = self.geometry(image_size);
        self.run_postprocess(outputs, &geometry)
            .map(|(_, predictions)| predictions)
    }

    fn geometry(&self, image_size: (u32, u32)) -> GeometryTransform {
        GeometryTransform::new(
            self.backend.metadata().input_size(),
            image_size,
            self.decoder.gain_mode(),
        )
    }

    fn run_postprocess(
        &self,
        outputs: &[ArrayD<f32>],
        geometry: &GeometryTransform,
    ) -> Result<(usize, Vec<Prediction>)> {
        let _s = common::span!("postprocess");

        let ctx = DecodeContext {
            geometry,
            num_labels: self.labels.len(),
            objectness_confidence: self.objectness_confidence,
            class_confidence: self.class_confidence,
            anchors: &self.anchors,
        };

        let candidates = self.decoder.decode(outputs, &ctx)?;
        let decoded = candidates.len();
        let kept = suppress(candidates, self.overlap_threshold);

        let predictions = kept
            .into_iter()
            .filter_map(|candidate| {
                self.labels.get(candidate.label_index).map(|label| Prediction {
                    label: label.clone(),
                    score: candidate.score,
                    rect: candidate.rect,
                })
            })
            .collect();

        Ok((decoded, predictions))
    }
}
