use schema::{
    ALL_FILTERED_DESCRIPTION, Detection, NO_CANDIDATES_DESCRIPTION, NOT_DETECTED_LABEL,
    RawDetection, describe, label_for, round3,
};
use serde::Serialize;

/// Candidates below this confidence are dropped. Fixed policy.
pub const MIN_CONFIDENCE: f64 = 0.20;
/// Candidates whose normalized `width * height` is below this are dropped.
/// Fixed policy.
pub const MIN_AREA: f64 = 0.003;

/// Why a ranked result holds no detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The model produced no candidates at all.
    NoCandidates,
    /// Candidates existed but none survived filtering.
    Filtered,
}

/// Filtered detections in model order, plus the index of the dominant one.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDetections {
    pub detections: Vec<Detection>,
    dominant: Option<usize>,
    empty_reason: Option<EmptyReason>,
}

impl RankedDetections {
    pub fn dominant(&self) -> Option<&Detection> {
        self.dominant.map(|i| &self.detections[i])
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        self.empty_reason
    }

    /// Dominant label, or the not-detected sentinel.
    pub fn dominant_label(&self) -> &str {
        self.dominant()
            .map(|d| d.label.as_str())
            .unwrap_or(NOT_DETECTED_LABEL)
    }

    pub fn description(&self) -> &'static str {
        match (self.dominant(), self.empty_reason) {
            (Some(d), _) => describe(&d.label),
            (None, Some(EmptyReason::Filtered)) => ALL_FILTERED_DESCRIPTION,
            (None, _) => NO_CANDIDATES_DESCRIPTION,
        }
    }
}

#[inline]
fn passes_policy(raw: &RawDetection) -> bool {
    // Comparisons with NaN are false, so NaN never passes.
    raw.confidence >= MIN_CONFIDENCE && raw.bbox.area() >= MIN_AREA
}

/// Apply the confidence/area policy to raw candidates and pick the dominant
/// detection: strictly highest confidence, first one wins on ties.
///
/// `image_size` is only recorded on the span; boxes are already normalized.
#[tracing::instrument(skip(candidates), fields(candidates = candidates.len()))]
pub fn filter_and_rank(candidates: &[RawDetection], image_size: (u32, u32)) -> RankedDetections {
    if candidates.is_empty() {
        return RankedDetections {
            detections: Vec::new(),
            dominant: None,
            empty_reason: Some(EmptyReason::NoCandidates),
        };
    }

    let detections: Vec<Detection> = candidates
        .iter()
        .filter(|raw| passes_policy(raw))
        .map(|raw| Detection {
            class_id: raw.class_id,
            confidence: round3(raw.confidence),
            label: label_for(raw.class_id).into_owned(),
            bbox: raw.bbox,
        })
        .collect();

    if detections.is_empty() {
        tracing::debug!("All candidates filtered as weak or small");
        return RankedDetections {
            detections,
            dominant: None,
            empty_reason: Some(EmptyReason::Filtered),
        };
    }

    let mut dominant = 0;
    for (i, det) in detections.iter().enumerate().skip(1) {
        if det.confidence > detections[dominant].confidence {
            dominant = i;
        }
    }

    tracing::debug!(
        kept = detections.len(),
        dominant = %detections[dominant].label,
        "Candidates ranked"
    );

    RankedDetections {
        detections,
        dominant: Some(dominant),
        empty_reason: None,
    }
}
