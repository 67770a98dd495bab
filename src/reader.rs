//! Random access over a recording without a trailing index.
//!
//! # Lookup
//! Every resolved frame index is remembered in an [`IndexCache`]. A lookup
//! starts from the closest cached frame at or below the target (the
//! *anchor*) and extrapolates using the anchor's declared `n_frame_bytes`:
//!
//! ```text
//! offset = anchor_offset + n_frame_bytes * (goal - anchor_index)
//! ```
//!
//! The header at `offset` either carries `goal` (a hit: cache it, move the
//! anchor, leap ten times further next time) or it does not (a miss: drop
//! back to single-record steps along declared lengths). Constant-stride
//! recordings resolve any frame with one peek; variable-stride ones walk,
//! and every frame walked past is cached for later lookups.
//!
//! Failed leaps per lookup are bounded by [`ReaderOptions::max_attempts`];
//! once spent, the lookup stops extrapolating and walks the rest.
//!
//! # Concurrency
//! A reader owns its cursor and cache. Lookups move the cursor, so one
//! reader serves one consumer at a time.

use std::fs::File;
use std::io::{Read, Seek};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::config::ReaderOptions;
use crate::error::{Kw6Error, Result};
use crate::index::{IndexCache, IndexSnapshot, StepConfidence};
use crate::io_stream::Kw6Stream;
use crate::position::{PositionHeader, PositionRecord, POSITION_HEADER_SIZE};
use crate::scan::{self, ScanReport};
use crate::sidecar;
use crate::version::{VersionTag, VERSION_SIZE};

pub struct Reader<R: Read + Seek> {
    stream:              Kw6Stream<R>,
    cache:               IndexCache,
    initial_frame_index: i64,
    options:             ReaderOptions,
}

impl Reader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(File::open(path)?, ReaderOptions::default(), None)
    }

    /// Open a recording and pre-seed the cache from its `.hdr` sidecar.
    pub fn open_with_sidecar<P: AsRef<Path>, Q: AsRef<Path>>(path: P, sidecar_path: Q) -> Result<Self> {
        let seed = sidecar::read_sidecar(sidecar_path, sidecar::DEFAULT_POSITION_DIVISOR)?;
        Self::with_options(File::open(path)?, ReaderOptions::default(), Some(seed))
    }
}

impl<R: Read + Seek> Reader<R> {
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, ReaderOptions::default(), None)
    }

    /// Validate the version tag, record the first frame and apply `seed`.
    pub fn with_options(source: R, options: ReaderOptions, seed: Option<IndexCache>) -> Result<Self> {
        let mut stream = Kw6Stream::new(source)?;
        if stream.is_exhausted()? {
            return Err(Kw6Error::Format("recording contains no positions".into()));
        }
        let first = stream.peek_position_header()?;

        let mut cache = IndexCache::new();
        cache.insert(first.frame_index, VERSION_SIZE as u64);

        let mut reader = Self {
            stream,
            cache,
            initial_frame_index: first.frame_index,
            options,
        };
        if let Some(seed) = seed {
            reader.seed(&seed);
        }
        debug!(
            "Opened recording: {} bytes, first frame {}, {} cached offsets",
            reader.file_size(),
            reader.initial_frame_index,
            reader.cache.len()
        );
        Ok(reader)
    }

    /// Add externally known offsets to the cache. Entries that cannot belong
    /// to this recording are dropped.
    pub fn seed(&mut self, seed: &IndexCache) {
        let file_size = self.file_size();
        let mut dropped = 0usize;
        for (frame_index, offset) in seed.iter() {
            let plausible = frame_index >= self.initial_frame_index
                && offset >= VERSION_SIZE as u64
                && offset < file_size;
            if plausible {
                self.cache.insert(frame_index, offset);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("Ignored {dropped} seed offsets outside the recording");
        }
    }

    /// Seed from a snapshot taken of this same file.
    pub fn restore(&mut self, snapshot: IndexSnapshot) -> Result<()> {
        let cache = snapshot.into_cache(self.file_size())?;
        self.seed(&cache);
        Ok(())
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::capture(&self.cache, self.file_size())
    }

    pub fn version(&self) -> &VersionTag {
        self.stream.version()
    }

    pub fn initial_frame_index(&self) -> i64 {
        self.initial_frame_index
    }

    pub fn file_size(&self) -> u64 {
        self.stream.file_size()
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn into_inner(self) -> R {
        self.stream.into_inner()
    }

    // ── Random access ────────────────────────────────────────────────────────

    /// Decode the full position with this frame index.
    pub fn resolve(&mut self, frame_index: i64) -> Result<PositionRecord> {
        let offset = self.locate(frame_index)?;
        self.stream.seek_to(offset)?;
        let record = self.stream.read_position()?;
        if record.header.frame_index != frame_index {
            return Err(Kw6Error::Format(format!(
                "offset {offset} cached for frame {frame_index} holds frame {}",
                record.header.frame_index
            )));
        }
        Ok(record)
    }

    /// Header only, without reading any image.
    pub fn header(&mut self, frame_index: i64) -> Result<PositionHeader> {
        let offset = self.locate(frame_index)?;
        let header = self.stream.header_at(offset)?;
        if header.frame_index != frame_index {
            return Err(Kw6Error::Format(format!(
                "offset {offset} cached for frame {frame_index} holds frame {}",
                header.frame_index
            )));
        }
        Ok(header)
    }

    /// Every `step`-th frame index from `range.start` towards `range.end`
    /// (exclusive). A negative step walks downwards, so `start` must then
    /// be above `end`.
    pub fn resolve_range(&mut self, range: Range<i64>, step: i64) -> Result<Vec<PositionRecord>> {
        if step == 0 {
            return Err(Kw6Error::InvalidStep);
        }
        let Range { start, end } = range;
        let frame_indices: Vec<i64> = std::iter::successors(Some(start), |&i| i.checked_add(step))
            .take_while(|&i| if step > 0 { i < end } else { i > end })
            .collect();
        self.resolve_many(&frame_indices)
    }

    /// Frame indices in the order given; repeats are allowed.
    pub fn resolve_many(&mut self, frame_indices: &[i64]) -> Result<Vec<PositionRecord>> {
        frame_indices.iter().map(|&frame_index| self.resolve(frame_index)).collect()
    }

    /// Byte offset of the position header carrying `frame_index`.
    pub fn locate(&mut self, frame_index: i64) -> Result<u64> {
        if frame_index < 0 || frame_index < self.initial_frame_index {
            return Err(Kw6Error::OutOfRange { frame_index, first: self.initial_frame_index });
        }
        let (mut anchor_index, mut anchor_offset, mut anchor) = self.anchor_for(frame_index)?;
        let mut step = StepConfidence::Unknown;
        let mut misses = 0usize;

        loop {
            if anchor_index == frame_index {
                return Ok(anchor_offset);
            }
            if anchor_index > frame_index {
                return Err(Kw6Error::NotFound(frame_index));
            }

            if step.is_single_step() {
                let (next_offset, next) = self
                    .next_position(anchor_offset, &anchor, anchor_index, frame_index)?
                    .ok_or(Kw6Error::NotFound(frame_index))?;
                self.cache.insert(next.frame_index, next_offset);
                anchor_index = next.frame_index;
                anchor_offset = next_offset;
                anchor = next;
                if misses < self.options.max_attempts {
                    step = step.on_hit();
                }
                continue;
            }

            let goal = step.goal(anchor_index, frame_index);
            match self.probe(anchor_offset, anchor.n_frame_bytes, goal - anchor_index)? {
                Some((offset, header)) if header.frame_index == goal => {
                    trace!("Extrapolated frame {goal} at offset {offset}");
                    self.cache.insert(goal, offset);
                    anchor_index = goal;
                    anchor_offset = offset;
                    anchor = header;
                    step = step.on_hit();
                }
                _ => {
                    misses += 1;
                    trace!("Extrapolation miss towards frame {goal} ({misses} so far)");
                    if misses == self.options.max_attempts {
                        debug!(
                            "Frame {frame_index}: {misses} extrapolation misses, walking from frame {anchor_index}"
                        );
                    }
                    step = step.on_miss();
                }
            }
        }
    }

    /// Closest cached frame at or below `frame_index` whose offset really
    /// holds that frame. Entries that do not (a wrong sidecar or snapshot)
    /// are dropped on the way down.
    fn anchor_for(&mut self, frame_index: i64) -> Result<(i64, u64, PositionHeader)> {
        while let Some((anchor_index, anchor_offset)) = self.cache.floor(frame_index) {
            match self.stream.header_at(anchor_offset) {
                Ok(header) if header.frame_index == anchor_index => {
                    return Ok((anchor_index, anchor_offset, header));
                }
                Ok(header) => warn!(
                    "Offset {anchor_offset} cached for frame {anchor_index} holds frame {}, dropping it",
                    header.frame_index
                ),
                Err(e) if e.is_decode_failure() => {
                    warn!("Offset {anchor_offset} cached for frame {anchor_index} is unreadable, dropping it: {e}")
                }
                Err(e) => return Err(e),
            }
            self.cache.remove(anchor_index);
        }
        Err(Kw6Error::OutOfRange { frame_index, first: self.initial_frame_index })
    }

    /// Peek the header `frames` strides past the anchor. `None` when the
    /// target offset is outside the file or does not hold a header.
    fn probe(&mut self, anchor_offset: u64, stride: u64, frames: i64) -> Result<Option<(u64, PositionHeader)>> {
        let offset = u64::try_from(frames)
            .ok()
            .and_then(|frames| stride.checked_mul(frames))
            .and_then(|delta| anchor_offset.checked_add(delta));
        let file_size = self.file_size();
        let offset = match offset {
            Some(offset)
                if offset
                    .checked_add(POSITION_HEADER_SIZE as u64)
                    .is_some_and(|end| end <= file_size) =>
            {
                offset
            }
            _ => return Ok(None),
        };
        match self.stream.header_at(offset) {
            Ok(header) => Ok(Some((offset, header))),
            Err(e) if e.is_decode_failure() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The position physically following the anchor, first by its declared
    /// length, then by its structural length if the declared one leads
    /// nowhere. `None` at the end of the file.
    fn next_position(
        &mut self,
        anchor_offset: u64,
        anchor: &PositionHeader,
        anchor_index: i64,
        target: i64,
    ) -> Result<Option<(u64, PositionHeader)>> {
        let dead_end = Kw6Error::IndexResolutionFailed {
            frame_index: target,
            attempts: self.options.max_attempts,
        };
        let declared = anchor_offset.saturating_add(anchor.n_frame_bytes);
        if declared == self.file_size() {
            return Ok(None);
        }
        if declared < self.file_size() {
            if let Some(found) = self.probe_successor(declared, anchor_index)? {
                return Ok(Some(found));
            }
        }

        self.stream.seek_to(anchor_offset)?;
        let record = match self.stream.read_position() {
            Ok(record) => record,
            Err(e) if e.is_decode_failure() => return Err(dead_end),
            Err(e) => return Err(e),
        };
        let structural = self.stream.position()?;
        warn!(
            "Frame {anchor_index}: declared length {} disagrees with structural length {}",
            anchor.n_frame_bytes,
            record.structural_len()
        );
        if structural >= self.file_size() {
            return Ok(None);
        }
        self.probe_successor(structural, anchor_index)?
            .map(Some)
            .ok_or(dead_end)
    }

    fn probe_successor(&mut self, offset: u64, anchor_index: i64) -> Result<Option<(u64, PositionHeader)>> {
        match self.stream.header_at(offset) {
            Ok(header) if header.frame_index > anchor_index => Ok(Some((offset, header))),
            Ok(_) => Ok(None),
            Err(e) if e.is_decode_failure() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Length ───────────────────────────────────────────────────────────────

    /// Number of frames, estimated in O(1) from a cached anchor's stride.
    ///
    /// The estimate is only returned once the predicted last position is
    /// found where expected and ends exactly at end of file. Fails with
    /// [`Kw6Error::LengthInferenceFailed`] otherwise; callers that still
    /// want a length then use [`Reader::scan_length`].
    pub fn assumptuous_length(&mut self) -> Result<u64> {
        let file_size = self.file_size();
        let anchors: Vec<(i64, u64)> = self.cache.iter().rev().take(self.options.max_attempts).collect();
        let attempts = anchors.len();

        for (anchor_index, anchor_offset) in anchors {
            let anchor = match self.stream.header_at(anchor_offset) {
                Ok(header) => header,
                Err(e) if e.is_decode_failure() => continue,
                Err(e) => return Err(e),
            };
            let records = (file_size - anchor_offset) as f64 / anchor.n_frame_bytes as f64;
            let rounded = records.round();
            if (records - rounded).abs() > self.options.length_epsilon || rounded < 1.0 {
                trace!("Anchor {anchor_index}: {records} strides to end of file, not integral");
                continue;
            }

            let last_index = anchor_index + rounded as i64 - 1;
            let Some((last_offset, last)) = self.probe(anchor_offset, anchor.n_frame_bytes, rounded as i64 - 1)? else {
                continue;
            };
            if last.frame_index == last_index && last_offset + last.n_frame_bytes == file_size {
                self.cache.insert(last_index, last_offset);
                let length = (last_index - self.initial_frame_index + 1) as u64;
                debug!("Inferred length {length} from anchor frame {anchor_index}");
                return Ok(length);
            }
        }

        debug!("Length inference failed after {attempts} anchors");
        Err(Kw6Error::LengthInferenceFailed { attempts })
    }

    /// Walk every position by declared length, caching each offset.
    pub fn scan<F: FnMut(u64, u64)>(&mut self, progress: Option<&mut F>) -> Result<ScanReport> {
        let report = scan::scan(&mut self.stream, progress)?;
        for &(frame_index, offset) in &report.frames {
            self.cache.insert(frame_index, offset);
        }
        Ok(report)
    }

    /// Number of positions found by a full linear walk.
    pub fn scan_length(&mut self) -> Result<u64> {
        Ok(self.scan::<fn(u64, u64)>(None)?.frames.len() as u64)
    }

    /// Inferred length, falling back to a linear walk when the stride is
    /// not constant.
    pub fn length(&mut self) -> Result<u64> {
        match self.assumptuous_length() {
            Err(Kw6Error::LengthInferenceFailed { .. }) => {
                warn!("Stride is not constant, counting positions linearly");
                self.scan_length()
            }
            other => other,
        }
    }

    // ── Iteration ────────────────────────────────────────────────────────────

    /// Every position in physical order from the start of the file.
    ///
    /// Independent of the cache-based lookup path; offsets seen along the
    /// way are cached. Stops after the first error.
    pub fn positions(&mut self) -> Positions<'_, R> {
        Positions { reader: self, started: false, done: false }
    }
}

/// Iterator returned by [`Reader::positions`].
pub struct Positions<'a, R: Read + Seek> {
    reader:  &'a mut Reader<R>,
    started: bool,
    done:    bool,
}

impl<R: Read + Seek> Positions<'_, R> {
    fn advance(&mut self) -> Result<Option<PositionRecord>> {
        let stream = &mut self.reader.stream;
        if !self.started {
            stream.rewind()?;
            self.started = true;
        }
        if stream.is_exhausted()? {
            return Ok(None);
        }
        let offset = stream.position()?;
        let record = stream.read_position()?;
        self.reader.cache.insert(record.header.frame_index, offset);
        Ok(Some(record))
    }
}

impl<R: Read + Seek> Iterator for Positions<'_, R> {
    type Item = Result<PositionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for Positions<'_, R> {}
