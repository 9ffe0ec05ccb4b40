use common::{TelemetryGuard, setup_logging};
use detector::{Detector, DetectorConfig, backend::ort::OrtBackend};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let image_path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: detect <image>"))?;

    let config = DetectorConfig::from_env()?;

    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init("detector", endpoint, config.environment)?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let mut detector = Detector::<OrtBackend>::load(&config)?;

    let image = image::open(&image_path)?.to_rgb8();
    let predictions = detector.predict(&image)?;

    tracing::info!(
        image = %image_path,
        width = image.width(),
        height = image.height(),
        count = predictions.len(),
        "Detection finished"
    );
    for prediction in &predictions {
        tracing::info!(label_id = prediction.label.id, "{prediction}");
    }

    Ok(())
}
