use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
///
/// Spans are also bridged to OpenTelemetry; they go nowhere unless a global
/// tracer provider was installed (see [`crate::TelemetryGuard`]).
pub fn setup_logging(environment: Environment) {
    init_subscriber(environment, tracing_opentelemetry::layer());
}

pub(crate) fn init_subscriber<L>(environment: Environment, otel_layer: L)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let registry = tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
