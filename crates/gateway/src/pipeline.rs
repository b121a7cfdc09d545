//! One end-to-end prediction: validate, decode, infer, rank, persist.

use inference::{EmptyReason, InferenceBackend, InferenceParams, filter_and_rank};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use schema::{Detection, DetectionRecord, RawDetection};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use store::{SessionId, SessionStore, StoreError};
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No image file was uploaded.")]
    MissingFile,

    #[error("File must be an image (jpg, jpeg, png, webp).")]
    UnsupportedExtension,

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(#[source] anyhow::Error),

    #[error("Failed to persist detection: {0}")]
    Storage(#[from] StoreError),
}

impl PipelineError {
    /// Caller mistakes, reported back verbatim with no side effects.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingFile | Self::UnsupportedExtension)
    }
}

/// Response body of a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEnvelope {
    pub success: bool,
    pub dominant_label: String,
    pub description: String,
    pub detections: Vec<Detection>,
    pub image_width: u32,
    pub image_height: u32,
    /// Seconds spent in the model call only.
    pub inference_time: f64,
    /// Present only when the result was persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

/// Case-insensitive check of the filename's extension against
/// [`ALLOWED_EXTENSIONS`].
pub fn validate_extension(filename: &str) -> Result<(), PipelineError> {
    let allowed = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedExtension)
    }
}

/// Nanoseconds since the epoch, bumped so every id handed out by this
/// generator is strictly greater than the previous one.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last: AtomicU64,
}

impl RecordIdGenerator {
    pub fn next_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}

struct PipelineMetrics {
    inference_duration: Histogram<f64>,
    predictions: Counter<u64>,
    persisted: Counter<u64>,
}

impl PipelineMetrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];
        Self {
            inference_duration: meter
                .f64_histogram("inference_duration_seconds")
                .with_description("Time spent in the model call for one uploaded image")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            predictions: meter
                .u64_counter("predictions_total")
                .with_description("Predictions completed, labelled by outcome")
                .build(),
            persisted: meter
                .u64_counter("records_persisted_total")
                .with_description("Detection records written to a session log")
                .build(),
        }
    }
}

/// Orchestrates a prediction against an injected model and a session store.
pub struct DetectionPipeline {
    backend: Arc<dyn InferenceBackend>,
    store: SessionStore,
    params: InferenceParams,
    ids: RecordIdGenerator,
    metrics: PipelineMetrics,
}

impl DetectionPipeline {
    pub fn new(backend: Arc<dyn InferenceBackend>, store: SessionStore, params: InferenceParams) -> Self {
        Self {
            backend,
            store,
            params,
            ids: RecordIdGenerator::default(),
            metrics: PipelineMetrics::new("gateway"),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one upload through the model.
    ///
    /// Only a non-empty result is persisted, and then either both the
    /// annotated image and the log entry are written or neither is.
    #[tracing::instrument(skip(self, session, image_bytes), fields(session = %session, bytes = image_bytes.len()))]
    pub fn predict(
        &self,
        session: &SessionId,
        image_bytes: &[u8],
        filename: &str,
    ) -> Result<PredictionEnvelope, PipelineError> {
        validate_extension(filename)?;

        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        let (width, height) = image.dimensions();

        let start = Instant::now();
        let candidates = self
            .backend
            .infer(&image, &self.params)
            .map_err(PipelineError::Inference)?;
        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.inference_duration.record(elapsed, &[]);

        let ranked = filter_and_rank(&candidates, (width, height));

        let mut envelope = PredictionEnvelope {
            success: true,
            dominant_label: ranked.dominant_label().to_string(),
            description: ranked.description().to_string(),
            detections: ranked.detections.clone(),
            image_width: width,
            image_height: height,
            inference_time: schema::round3(elapsed),
            log_id: None,
            empty_reason: ranked.empty_reason(),
        };

        if ranked.is_empty() {
            tracing::info!(
                candidates = candidates.len(),
                reason = ?ranked.empty_reason(),
                "Nothing to persist"
            );
            self.metrics
                .predictions
                .add(1, &[KeyValue::new("outcome", "empty")]);
            return Ok(envelope);
        }

        let record_id = self.persist(session, &image, &candidates, &envelope)?;
        tracing::info!(
            record_id = %record_id,
            detections = envelope.detections.len(),
            dominant = %envelope.dominant_label,
            "Prediction persisted"
        );
        self.metrics
            .predictions
            .add(1, &[KeyValue::new("outcome", "detected")]);
        self.metrics.persisted.add(1, &[]);

        envelope.log_id = Some(record_id);
        Ok(envelope)
    }

    fn persist(
        &self,
        session: &SessionId,
        image: &image::RgbImage,
        candidates: &[RawDetection],
        envelope: &PredictionEnvelope,
    ) -> Result<String, PipelineError> {
        let record_id = self.ids.next_id();
        let annotated = self.backend.plot(image, candidates);
        let image_path = self.store.save_image(session, &record_id, &annotated)?;

        let record = DetectionRecord {
            id: record_id.clone(),
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            dominant_label: envelope.dominant_label.clone(),
            description: envelope.description.clone(),
            detections: envelope.detections.clone(),
            inference_time: envelope.inference_time,
            image_path: image_path.to_string_lossy().into_owned(),
        };

        if let Err(e) = self.store.append(session, record) {
            self.store.remove_image(session, &record_id);
            return Err(e.into());
        }

        Ok(record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use schema::{BoundingBox, NO_CANDIDATES_DESCRIPTION, NOT_DETECTED_LABEL};
    use std::io::Cursor;
    use store::StoreLayout;
    use tempfile::tempdir;

    struct FixedBackend(Vec<RawDetection>);

    impl InferenceBackend for FixedBackend {
        fn infer(
            &self,
            _image: &RgbImage,
            _params: &InferenceParams,
        ) -> anyhow::Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl InferenceBackend for FailingBackend {
        fn infer(
            &self,
            _image: &RgbImage,
            _params: &InferenceParams,
        ) -> anyhow::Result<Vec<RawDetection>> {
            anyhow::bail!("session run failed")
        }
    }

    fn raw(class_id: u32, confidence: f64, width: f64, height: f64) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(0.5, 0.5, width, height),
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 160, 40]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn pipeline(backend: impl InferenceBackend + 'static, root: &Path) -> DetectionPipeline {
        DetectionPipeline::new(
            Arc::new(backend),
            SessionStore::new(StoreLayout::under(root)),
            InferenceParams::default(),
        )
    }

    #[test]
    fn test_extension_allow_list() {
        for ok in ["leaf.jpg", "leaf.JPEG", "a.b.png", "x.webp"] {
            assert!(validate_extension(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["leaf.gif", "leaf", "", "jpg", "leaf.jpg.exe"] {
            assert!(
                matches!(validate_extension(bad), Err(PipelineError::UnsupportedExtension)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_record_ids_strictly_increase() {
        let ids = RecordIdGenerator::default();
        let mut prev: u64 = ids.next_id().parse().unwrap();
        for _ in 0..1000 {
            let next: u64 = ids.next_id().parse().unwrap();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_detection_is_persisted_with_image() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(
            FixedBackend(vec![raw(3, 0.85, 0.1, 0.1), raw(1, 0.40, 0.002, 0.5)]),
            dir.path(),
        );
        let session = SessionId::generate();

        let envelope = pipeline
            .predict(&session, &png_bytes(64, 48), "leaf.png")
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.dominant_label, "healthy");
        assert_eq!(envelope.detections.len(), 1);
        assert_eq!((envelope.image_width, envelope.image_height), (64, 48));
        assert!(envelope.empty_reason.is_none());

        let log_id = envelope.log_id.clone().unwrap();
        let record = pipeline.store().find_by_id(&session, &log_id).unwrap();
        assert_eq!(record.dominant_label, "healthy");
        assert_eq!(record.detections, envelope.detections);
        assert_eq!(record.inference_time, envelope.inference_time);

        let stored = pipeline.store().read_image(&session, &log_id).unwrap().unwrap();
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_empty_result_persists_nothing() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FixedBackend(Vec::new()), dir.path());
        let session = SessionId::generate();

        let envelope = pipeline
            .predict(&session, &png_bytes(16, 16), "leaf.jpg")
            .unwrap();

        assert!(envelope.detections.is_empty());
        assert_eq!(envelope.dominant_label, NOT_DETECTED_LABEL);
        assert_eq!(envelope.description, NO_CANDIDATES_DESCRIPTION);
        assert_eq!(envelope.empty_reason, Some(EmptyReason::NoCandidates));
        assert!(envelope.log_id.is_none());

        assert!(pipeline.store().list(&session).is_empty());
        assert!(!pipeline.store().layout().image_dir(&session).exists());
    }

    #[test]
    fn test_filtered_result_persists_nothing() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FixedBackend(vec![raw(0, 0.1, 0.5, 0.5)]), dir.path());
        let session = SessionId::generate();

        let envelope = pipeline
            .predict(&session, &png_bytes(16, 16), "leaf.png")
            .unwrap();

        assert_eq!(envelope.empty_reason, Some(EmptyReason::Filtered));
        assert!(pipeline.store().list(&session).is_empty());
    }

    #[test]
    fn test_rejected_extension_skips_everything() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FailingBackend, dir.path());
        let session = SessionId::generate();

        let err = pipeline
            .predict(&session, &png_bytes(16, 16), "leaf.gif")
            .unwrap_err();

        assert!(err.is_client_error());
    }

    #[test]
    fn test_undecodable_image_is_server_error() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FixedBackend(vec![raw(3, 0.9, 0.2, 0.2)]), dir.path());
        let session = SessionId::generate();

        let err = pipeline
            .predict(&session, b"definitely not an image", "leaf.png")
            .unwrap_err();

        assert!(matches!(err, PipelineError::Decode(_)));
        assert!(!err.is_client_error());
        assert!(pipeline.store().list(&session).is_empty());
    }

    #[test]
    fn test_inference_failure_persists_nothing() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FailingBackend, dir.path());
        let session = SessionId::generate();

        let err = pipeline
            .predict(&session, &png_bytes(16, 16), "leaf.png")
            .unwrap_err();

        assert!(matches!(err, PipelineError::Inference(_)));
        assert!(pipeline.store().list(&session).is_empty());
        assert!(!pipeline.store().layout().image_dir(&session).exists());
    }

    #[test]
    fn test_unencodable_annotation_persists_nothing() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FixedBackend(vec![raw(3, 0.9, 0.5, 0.5)]), dir.path());
        let session = SessionId::generate();

        // JPEG tops out at 65535 px per side
        let err = pipeline
            .predict(&session, &png_bytes(70_000, 1), "leaf.png")
            .unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(pipeline.store().list(&session).is_empty());
        let image_dir = pipeline.store().layout().image_dir(&session);
        let leftovers = std::fs::read_dir(&image_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_envelope_serialization_omits_absent_fields() {
        let envelope = PredictionEnvelope {
            success: true,
            dominant_label: NOT_DETECTED_LABEL.to_string(),
            description: NO_CANDIDATES_DESCRIPTION.to_string(),
            detections: Vec::new(),
            image_width: 10,
            image_height: 20,
            inference_time: 0.05,
            log_id: None,
            empty_reason: Some(EmptyReason::NoCandidates),
        };

        let json = serde_json::to_value(&envelope).unwrap();

        assert!(json.get("log_id").is_none());
        assert_eq!(json["empty_reason"], "no_candidates");
        assert_eq!(json["detections"], serde_json::json!([]));
    }
}
