use crate::processing::DecoderKind;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

/// Instruments on the global meter. No-ops until a meter provider is installed.
#[derive(Clone)]
pub struct DetectorMetrics {
    predict_duration: Histogram<f64>,
    candidates: Counter<u64>,
    predictions: Counter<u64>,
}

impl DetectorMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.001, 0.002, 0.005, 0.01, 0.015, 0.02, 0.025, 0.03, 0.04, 0.05, 0.075, 0.1, 0.15,
            0.2, 0.5, 1.0,
        ];

        Self {
            predict_duration: meter
                .f64_histogram("detector_predict_duration_seconds")
                .with_description("Time to run one prediction (preprocess + infer + postprocess)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            candidates: meter
                .u64_counter("detector_candidates_total")
                .with_description("Candidates produced by decoding, before suppression")
                .build(),
            predictions: meter
                .u64_counter("detector_predictions_total")
                .with_description("Predictions returned after suppression")
                .build(),
        }
    }

    pub fn record(
        &self,
        decoder: DecoderKind,
        elapsed: Duration,
        candidates: usize,
        predictions: usize,
    ) {
        let attributes = [KeyValue::new("decoder", decoder.to_string())];
        self.predict_duration
            .record(elapsed.as_secs_f64(), &attributes);
        self.candidates.add(candidates as u64, &attributes);
        self.predictions.add(predictions as u64, &attributes);
    }
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new("detector")
    }
}
