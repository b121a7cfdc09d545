pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;
pub mod stats;

pub use error::ApiError;
pub use pipeline::{DetectionPipeline, PipelineError, PredictionEnvelope};
pub use service::DetectionService;
pub use state::AppState;
