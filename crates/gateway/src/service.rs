use crate::pipeline::{DetectionPipeline, PipelineError, PredictionEnvelope};
use crate::report::{self, ReportDocument};
use crate::stats::{self, SessionStats};
use schema::DetectionRecord;
use store::{SessionId, SessionStore, StoreError};

/// Session-scoped operations behind the HTTP routes. Every call takes the
/// caller's session explicitly and is blocking.
pub struct DetectionService {
    pipeline: DetectionPipeline,
}

impl DetectionService {
    pub fn new(pipeline: DetectionPipeline) -> Self {
        Self { pipeline }
    }

    fn store(&self) -> &SessionStore {
        self.pipeline.store()
    }

    pub fn predict(
        &self,
        session: &SessionId,
        image_bytes: &[u8],
        filename: &str,
    ) -> Result<PredictionEnvelope, PipelineError> {
        self.pipeline.predict(session, image_bytes, filename)
    }

    /// Most recent record first.
    pub fn list_history(&self, session: &SessionId) -> Vec<DetectionRecord> {
        let mut records = self.store().list(session);
        records.reverse();
        records
    }

    pub fn clear_history(&self, session: &SessionId) -> Result<(), StoreError> {
        self.store().clear(session)
    }

    pub fn stats(&self, session: &SessionId) -> SessionStats {
        stats::aggregate(&self.store().list(session))
    }

    pub fn get_record(&self, session: &SessionId, record_id: &str) -> Option<DetectionRecord> {
        self.store().find_by_id(session, record_id)
    }

    /// Stored annotated image for a record of this session.
    ///
    /// `Ok(None)` when the record is unknown here or its image file is gone.
    pub fn get_image(
        &self,
        session: &SessionId,
        record_id: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        if self.get_record(session, record_id).is_none() {
            return Ok(None);
        }
        self.store().read_image(session, record_id)
    }

    /// Report layout for one record, `None` when the id is unknown in this
    /// session. An unreadable image degrades the report instead of failing it.
    pub fn render_report(&self, session: &SessionId, record_id: &str) -> Option<ReportDocument> {
        let record = self.get_record(session, record_id)?;

        let image = match self.store().read_image(session, &record.id) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(record_id = %record.id, error = %e, "Could not read report image");
                None
            }
        };

        Some(report::assemble(&record, image.as_deref()))
    }
}
