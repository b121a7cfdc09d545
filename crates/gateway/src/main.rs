use anyhow::Context;
use common::{TelemetryGuard, setup_logging};
use gateway::{
    AppState, DetectionPipeline, DetectionService,
    config::get_configuration,
    routes::{router, run_server},
};
use inference::backend::ort::OrtBackend;
use std::sync::Arc;
use store::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;

    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init(
            "gateway",
            endpoint,
            config.log_level,
            config.environment,
        )?),
        None => {
            setup_logging(config.log_level, config.environment);
            None
        }
    };

    tracing::info!(
        bind_addr = %config.bind_addr,
        model = %config.model_path.display(),
        environment = config.environment.as_str(),
        "Starting gateway"
    );

    if !config.model_path.exists() {
        anyhow::bail!("Model file not found: {}", config.model_path.display());
    }

    let backend = OrtBackend::load_model(&config.model_path.to_string_lossy(), config.input_size)
        .context("failed to load model")?;

    let pipeline = DetectionPipeline::new(
        Arc::new(backend),
        SessionStore::new(config.store_layout()),
        config.inference_params(),
    );
    let state = AppState::new(DetectionService::new(pipeline));

    run_server(&config.bind_addr, router(state, config.max_upload_bytes)).await
}
