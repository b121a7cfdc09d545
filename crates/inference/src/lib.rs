pub mod annotate;
pub mod backend;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceParams};
pub use processing::post::{EmptyReason, MIN_AREA, MIN_CONFIDENCE, RankedDetections, filter_and_rank};
