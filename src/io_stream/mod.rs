//! Sequential cursor over a recording.
//!
//! [`Kw6Stream`] validates the version tag on construction and then walks
//! position records in physical order. It knows nothing about frame
//! indices beyond what the header at the current offset says; random
//! access is layered on top by [`Reader`](crate::reader::Reader).
//!
//! Two ways to move past a position:
//! - `read_position` decodes every camera and consumes exactly the bytes
//!   the fields describe.
//! - `skip_position` decodes only the header and jumps by the declared
//!   `n_frame_bytes`. This is the fast path and the one the index trusts.
//!
//! After any error the cursor offset is unspecified; callers re-seek.

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

use crate::error::{Kw6Error, Result};
use crate::position::{PositionHeader, PositionRecord, POSITION_HEADER_SIZE};
use crate::version::{VersionTag, VERSION_SIZE};

/// Read buffer size. Large enough to hold several small positions.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

pub struct Kw6Stream<R: Read + Seek> {
    reader:    BufReader<R>,
    version:   VersionTag,
    file_size: u64,
}

impl<R: Read + Seek> Kw6Stream<R> {
    /// Validate the version tag and leave the cursor on the first position.
    pub fn new(mut inner: R) -> Result<Self> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, inner);
        let version = VersionTag::read(&mut reader)?;
        Ok(Self { reader, version, file_size })
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    /// Size of the source when it was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    /// True iff no byte can be read at the current offset.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    /// Absolute seek. Relative when possible so nearby peeks reuse the buffer.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let current = self.reader.stream_position()?;
        match i64::try_from(offset as i128 - current as i128) {
            Ok(delta) => self.reader.seek_relative(delta)?,
            Err(_) => {
                self.reader.seek(SeekFrom::Start(offset))?;
            }
        }
        Ok(())
    }

    /// Back to the first position, just past the version tag.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek_to(VERSION_SIZE as u64)
    }

    /// Decode the header at the cursor without moving it.
    pub fn peek_position_header(&mut self) -> Result<PositionHeader> {
        let start = self.position()?;
        match PositionHeader::read(&mut self.reader) {
            Ok(header) => {
                self.reader.seek_relative(-(POSITION_HEADER_SIZE as i64))?;
                Ok(header)
            }
            Err(e) => {
                self.seek_to(start)?;
                Err(e)
            }
        }
    }

    /// Seek to `offset` and peek the header there.
    pub fn header_at(&mut self, offset: u64) -> Result<PositionHeader> {
        self.seek_to(offset)?;
        self.peek_position_header()
    }

    /// Decode header and cameras, leaving the cursor after the last image.
    pub fn read_position(&mut self) -> Result<PositionRecord> {
        PositionRecord::read(&mut self.reader)
    }

    /// Decode the header and advance by its declared `n_frame_bytes`.
    pub fn skip_position(&mut self) -> Result<PositionHeader> {
        let start = self.position()?;
        let header = PositionHeader::read(&mut self.reader)?;
        let end = start.checked_add(header.n_frame_bytes).ok_or_else(|| {
            Kw6Error::Format(format!(
                "declared length {} at offset {start} overflows",
                header.n_frame_bytes
            ))
        })?;
        let rest = header.n_frame_bytes - POSITION_HEADER_SIZE as u64;
        match i64::try_from(rest) {
            Ok(rest) => self.reader.seek_relative(rest)?,
            Err(_) => self.seek_to(end)?,
        }
        Ok(header)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}
