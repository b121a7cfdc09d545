use crate::errors::StoreError;
use crate::paths::StoreLayout;
use crate::session::SessionId;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use schema::DetectionRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 92;

/// Per-session detection log plus annotated image directory.
///
/// Every operation is scoped to one [`SessionId`]; nothing here reads or
/// writes a path belonging to another session. Calls for the same session
/// are not synchronized against each other.
#[derive(Debug, Clone)]
pub struct SessionStore {
    layout: StoreLayout,
}

impl SessionStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Full log in insertion order (oldest first).
    ///
    /// A missing, unreadable or corrupt log reads as empty. Individual
    /// entries that no longer decode are skipped.
    pub fn list(&self, session: &SessionId) -> Vec<DetectionRecord> {
        let path = self.layout.log_path(session);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable session log, treating as empty");
                return Vec::new();
            }
        };

        let entries = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Session log is not a JSON array, treating as empty");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt session log, treating as empty");
                return Vec::new();
            }
        };

        let total = entries.len();
        let records: Vec<DetectionRecord> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();

        if records.len() != total {
            tracing::warn!(
                path = %path.display(),
                skipped = total - records.len(),
                "Skipped malformed session log entries"
            );
        }

        records
    }

    /// Linear scan of the log for `record_id`.
    pub fn find_by_id(&self, session: &SessionId, record_id: &str) -> Option<DetectionRecord> {
        self.list(session).into_iter().find(|r| r.id == record_id)
    }

    /// Append one record, rewriting the whole log.
    ///
    /// The rewrite starts from [`list`](Self::list), so entries that no
    /// longer decode are dropped from the log for good.
    pub fn append(&self, session: &SessionId, record: DetectionRecord) -> Result<(), StoreError> {
        let mut records = self.list(session);

        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateRecord(record.id));
        }

        tracing::debug!(session = %session, record_id = %record.id, "Appending detection record");

        records.push(record);
        self.write_log(session, &records)
    }

    /// Empty the log and remove the session's image directory.
    ///
    /// Image removal is best effort; only a failure to write the empty log
    /// is reported.
    pub fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        self.write_log(session, &[])?;

        let dir = self.layout.image_dir(session);
        if let Err(e) = fs::remove_dir_all(&dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to remove session images");
        }

        tracing::info!(session = %session, "Session history cleared");
        Ok(())
    }

    /// Encode the annotated image as JPEG under `<image_dir>/<record_id>.jpg`.
    ///
    /// Encoding happens in memory, so a failed encode leaves no file behind.
    pub fn save_image(
        &self,
        session: &SessionId,
        record_id: &str,
        image: &RgbImage,
    ) -> Result<PathBuf, StoreError> {
        let path = self.layout.image_path(session, record_id)?;

        let mut jpeg = Vec::new();
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))?;

        fs::create_dir_all(self.layout.image_dir(session))?;
        write_replace(&path, &jpeg)?;

        Ok(path)
    }

    /// Stored image bytes, or `None` if the file does not exist.
    pub fn read_image(
        &self,
        session: &SessionId,
        record_id: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.layout.image_path(session, record_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of one stored image.
    pub fn remove_image(&self, session: &SessionId, record_id: &str) {
        let Ok(path) = self.layout.image_path(session, record_id) else {
            return;
        };
        if let Err(e) = fs::remove_file(&path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove image");
        }
    }

    fn write_log(&self, session: &SessionId, records: &[DetectionRecord]) -> Result<(), StoreError> {
        let path = self.layout.log_path(session);
        fs::create_dir_all(&self.layout.log_dir)?;

        let json = serde_json::to_vec_pretty(records)?;
        write_replace(&path, &json)?;
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_replace(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
