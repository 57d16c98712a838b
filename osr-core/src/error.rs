//! Errors reported by the replay collaborators
//!
//! The engine itself never fails on the per-tick path; only persistence and
//! export boundaries produce errors, which the engine turns into failure
//! notifications.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no saved recording in slot '{0}'")]
    NotFound(String),

    #[error("invalid slot name '{0}'")]
    InvalidSlot(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode recording: {0}")]
    Encode(String),

    #[error("failed to decode recording: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no recording available to export")]
    NothingToExport,

    #[error("invalid export settings: {0}")]
    InvalidSettings(String),

    #[error("unknown export job {0}")]
    UnknownJob(u64),

    #[error("encoder failed: {0}")]
    Encoder(String),
}
