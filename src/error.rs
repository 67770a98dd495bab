//! Error taxonomy shared by every layer of the reader.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Kw6Error>;

#[derive(Error, Debug)]
pub enum Kw6Error {
    /// Bad version tag, malformed header, absurd image dimensions.
    #[error("Format error: {0}")]
    Format(String),

    /// Fewer bytes were available than a fixed-size field block requires.
    #[error("Truncated record: needed {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Negative index, or an index before the first frame of the recording.
    #[error("Frame index {frame_index} out of range (first frame is {first})")]
    OutOfRange { frame_index: i64, first: i64 },

    /// The index lies past the end of the recording or inside a gap.
    #[error("Frame index {0} not present in recording")]
    NotFound(i64),

    #[error("Could not resolve frame index {frame_index} within {attempts} attempts")]
    IndexResolutionFailed { frame_index: i64, attempts: usize },

    /// The O(1) length estimate could not be confirmed; traverse linearly instead.
    #[error("Length inference failed after {attempts} anchors (variable stride?)")]
    LengthInferenceFailed { attempts: usize },

    #[error("Range step must be non-zero")]
    InvalidStep,

    #[error("Sidecar index error: {0}")]
    Sidecar(String),

    #[error("Index snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("PNG encoding error: {0}")]
    Png(String),
}

impl Kw6Error {
    /// True for errors caused by the bytes at a position not forming a
    /// valid record, as opposed to the underlying source failing.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Kw6Error::Format(_) | Kw6Error::TruncatedRecord { .. })
    }
}

impl From<png::EncodingError> for Kw6Error {
    fn from(e: png::EncodingError) -> Self {
        match e {
            png::EncodingError::IoError(io) => Kw6Error::Io(io),
            other => Kw6Error::Png(other.to_string()),
        }
    }
}
