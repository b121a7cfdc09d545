//! On-disk layout of the session store.
//!
//! Every path is a function of the session id (and record id) alone:
//! - log: `<log_dir>/detections_<sid>.json`
//! - images: `<images_dir>/<sid>/<record_id>.jpg`

use crate::errors::StoreError;
use crate::session::SessionId;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_IMAGES_DIR: &str = "detected_images";

#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub log_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(log_dir: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            images_dir: images_dir.into(),
        }
    }

    /// Layout rooted in a single directory, used by tests.
    pub fn under(root: &Path) -> Self {
        Self::new(root.join(DEFAULT_LOG_DIR), root.join(DEFAULT_IMAGES_DIR))
    }

    pub fn log_path(&self, session: &SessionId) -> PathBuf {
        self.log_dir.join(format!("detections_{}.json", session))
    }

    pub fn image_dir(&self, session: &SessionId) -> PathBuf {
        self.images_dir.join(session.as_str())
    }

    pub fn image_path(&self, session: &SessionId, record_id: &str) -> Result<PathBuf, StoreError> {
        validate_record_id(record_id)?;
        Ok(self.image_dir(session).join(format!("{}.jpg", record_id)))
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR, DEFAULT_IMAGES_DIR)
    }
}

fn validate_record_id(record_id: &str) -> Result<(), StoreError> {
    let valid = !record_id.is_empty()
        && record_id.len() <= 64
        && record_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidRecordId(record_id.to_string()))
    }
}
