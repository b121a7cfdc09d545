//! Data model shared by the inference, store and gateway crates.
//!
//! The serde field names of [`DetectionRecord`] and [`Detection`] are the
//! on-disk log format and must not change.

mod classes;
mod detection;
mod record;

pub use classes::{
    ALL_FILTERED_DESCRIPTION, CLASS_NAMES, FALLBACK_DESCRIPTION, HEALTHY_LABEL,
    NO_CANDIDATES_DESCRIPTION, NOT_DETECTED_LABEL, describe, label_for,
};
pub use detection::{BoundingBox, Detection, RawDetection, round3};
pub use record::DetectionRecord;
