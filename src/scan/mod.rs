//! Full linear traversal: walk every position without the index.
//!
//! # How it works
//!
//! The scanner starts right after the version tag and hops from header to
//! header using each position's declared `n_frame_bytes`. Only headers are
//! decoded, so a scan costs one 48-byte read per position no matter how
//! large the images are.
//!
//! This is the fallback when [`Reader::assumptuous_length`] cannot trust
//! the stride, and the way to check a recording's layout:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `strides` | every distinct declared length seen |
//! | `monotonic` | frame indices strictly increase |
//! | `trailing_bytes` | bytes after the last complete position |
//!
//! A header that fails to decode, or whose declared length runs past the
//! end of the file, ends the scan; the remainder is reported as trailing.
//!
//! ## Progress
//!
//! `scan()` accepts an optional callback called after every position with
//! `(bytes_scanned, file_size)`.
//!
//! [`Reader::assumptuous_length`]: crate::reader::Reader::assumptuous_length

use std::collections::BTreeSet;
use std::io::{Read, Seek};
use tracing::{debug, warn};

use crate::error::Result;
use crate::io_stream::Kw6Stream;
use crate::version::VERSION_SIZE;

/// Outcome of a linear scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// `(frame_index, offset)` for every complete position, in file order.
    pub frames:         Vec<(i64, u64)>,
    /// Distinct declared position lengths, ascending.
    pub strides:        Vec<u64>,
    /// End offset of the last complete position.
    pub bytes_scanned:  u64,
    /// Bytes after the last complete position.
    pub trailing_bytes: u64,
    /// Frame indices strictly increase in file order.
    pub monotonic:      bool,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Every position declares the same length.
    pub fn constant_stride(&self) -> bool {
        self.strides.len() <= 1
    }

    pub fn first_frame(&self) -> Option<i64> {
        self.frames.first().map(|&(frame_index, _)| frame_index)
    }

    pub fn last_frame(&self) -> Option<i64> {
        self.frames.last().map(|&(frame_index, _)| frame_index)
    }

    /// Frame indices missing between the first and last frame.
    pub fn gaps(&self) -> u64 {
        match (self.first_frame(), self.last_frame()) {
            (Some(first), Some(last)) if self.monotonic => {
                (last - first + 1) as u64 - self.frames.len() as u64
            }
            _ => 0,
        }
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{} position(s), frames {}..={}, {} distinct stride(s), {} gap(s), {} trailing byte(s)",
            self.frames.len(),
            self.first_frame().map_or_else(|| "-".to_string(), |f| f.to_string()),
            self.last_frame().map_or_else(|| "-".to_string(), |f| f.to_string()),
            self.strides.len(),
            self.gaps(),
            self.trailing_bytes,
        )
    }
}

/// Scan a recording from its first position to the end.
///
/// Corrupt or truncated data ends the scan and shows up in
/// `trailing_bytes`; only genuine I/O errors propagate.
pub fn scan<R, F>(stream: &mut Kw6Stream<R>, mut progress: Option<&mut F>) -> Result<ScanReport>
where
    R: Read + Seek,
    F: FnMut(u64, u64),
{
    stream.rewind()?;
    let file_size = stream.file_size();

    let mut frames = Vec::new();
    let mut strides = BTreeSet::new();
    let mut monotonic = true;
    let mut bytes_scanned = VERSION_SIZE as u64;

    loop {
        if stream.is_exhausted()? {
            break;
        }
        let offset = stream.position()?;
        let header = match stream.skip_position() {
            Ok(header) => header,
            Err(e) if e.is_decode_failure() => {
                warn!("Scan stopped at offset {offset}: {e}");
                break;
            }
            Err(e) => return Err(e),
        };

        let end = offset.saturating_add(header.n_frame_bytes);
        if end > file_size {
            warn!(
                "Position {} at offset {offset} declares {} bytes, only {} remain",
                header.frame_index,
                header.n_frame_bytes,
                file_size - offset
            );
            break;
        }

        if let Some(&(previous, _)) = frames.last() {
            monotonic &= header.frame_index > previous;
        }
        frames.push((header.frame_index, offset));
        strides.insert(header.n_frame_bytes);
        bytes_scanned = end;

        if let Some(ref mut cb) = progress {
            cb(bytes_scanned, file_size);
        }
    }

    let report = ScanReport {
        frames,
        strides: strides.into_iter().collect(),
        bytes_scanned,
        trailing_bytes: file_size - bytes_scanned,
        monotonic,
    };
    debug!("Scan complete: {}", report.summary());
    Ok(report)
}
