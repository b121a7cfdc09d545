use crate::detection::Detection;
use serde::{Deserialize, Serialize};

/// One persisted prediction outcome. Immutable once appended to a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: String,
    /// Local time, `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: String,
    pub dominant_label: String,
    pub description: String,
    pub detections: Vec<Detection>,
    /// Seconds spent in the model call, 3 decimals.
    pub inference_time: f64,
    pub image_path: String,
}
