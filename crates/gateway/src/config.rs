use common::{Environment, LogLevel};
use inference::InferenceParams;
use serde::Deserialize;
use std::path::PathBuf;
use store::StoreLayout;

const DEFAULT_MAX_UPLOAD_BYTES: i64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub bind_addr: String,
    pub model_path: PathBuf,
    pub log_dir: PathBuf,
    pub images_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub input_size: u32,
    pub confidence_floor: f32,
    /// OTLP collector; plain logging only when unset.
    pub otel_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            input_size: self.input_size,
            confidence_floor: self.confidence_floor,
        }
    }

    pub fn store_layout(&self) -> StoreLayout {
        StoreLayout::new(&self.log_dir, &self.images_dir)
    }
}

pub fn get_configuration() -> Result<GatewayConfig, ::config::ConfigError> {
    let config = ::config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("bind_addr", "0.0.0.0:5000")?
        .set_default("model_path", "models/durianlast_yolo.onnx")?
        .set_default("log_dir", store::paths::DEFAULT_LOG_DIR)?
        .set_default("images_dir", store::paths::DEFAULT_IMAGES_DIR)?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
        .set_default("input_size", 640)?
        .set_default("confidence_floor", 0.20)?
        .add_source(
            ::config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: GatewayConfig = config.try_deserialize::<GatewayConfig>()?;

    Ok(config)
}
