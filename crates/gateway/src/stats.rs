use schema::{CLASS_NAMES, DetectionRecord, HEALTHY_LABEL};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-session aggregate over the dominant label of every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_detections: usize,
    /// Every known label is present, zero when unseen. Records whose dominant
    /// label is not a known class count towards the total only.
    pub per_class: BTreeMap<String, usize>,
    pub healthy_count: usize,
}

pub fn aggregate(records: &[DetectionRecord]) -> SessionStats {
    let mut per_class: BTreeMap<String, usize> = CLASS_NAMES
        .iter()
        .map(|label| (label.to_string(), 0))
        .collect();

    for record in records {
        if let Some(count) = per_class.get_mut(&record.dominant_label) {
            *count += 1;
        }
    }

    let healthy_count = per_class.get(HEALTHY_LABEL).copied().unwrap_or(0);

    SessionStats {
        total_detections: records.len(),
        per_class,
        healthy_count,
    }
}
