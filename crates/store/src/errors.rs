use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to encode session log: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to encode image: {0}")]
    ImageEncoding(#[from] image::ImageError),

    #[error("Invalid session id")]
    InvalidSessionId,

    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("Record {0} already exists in this session")]
    DuplicateRecord(String),
}
