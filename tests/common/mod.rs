#![allow(dead_code)]

//! Synthetic recordings for tests.

use byteorder::{LittleEndian, WriteBytesExt};
use std::cell::Cell;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use tempfile::NamedTempFile;

pub const VERSION: &[u8; 19] = b"KW6FileClassVer1.0 ";

#[derive(Debug, Clone)]
pub struct CameraSpec {
    pub camera_index: i64,
    pub width:        u32,
    pub height:       u32,
}

#[derive(Debug, Clone)]
pub struct PositionSpec {
    pub frame_index: i64,
    pub cameras:     Vec<CameraSpec>,
    /// Overrides the declared `n_frame_bytes`.
    pub declared:    Option<u64>,
}

impl PositionSpec {
    pub fn new(frame_index: i64, cameras: Vec<CameraSpec>) -> Self {
        Self { frame_index, cameras, declared: None }
    }

    pub fn structural_len(&self) -> u64 {
        48 + self.cameras.iter().map(|c| 272 + (c.width * c.height) as u64).sum::<u64>()
    }
}

pub fn camera(camera_index: i64, width: u32, height: u32) -> CameraSpec {
    CameraSpec { camera_index, width, height }
}

fn pixel(frame_index: i64, camera_index: i64, p: u32) -> u8 {
    (frame_index.wrapping_mul(31) + camera_index * 7 + p as i64) as u8
}

pub fn position_bytes(spec: &PositionSpec) -> Vec<u8> {
    let mut buf = Vec::new();
    let declared = spec.declared.unwrap_or_else(|| spec.structural_len());
    let time = -(spec.frame_index as f64 * 0.04) - 0.5;
    for value in [
        declared as f64,
        1.0,
        spec.frame_index as f64,
        time,
        -(spec.frame_index as f64 * 12.0) - 0.75,
        spec.cameras.len() as f64,
    ] {
        buf.write_f64::<LittleEndian>(value).unwrap();
    }
    for cam in &spec.cameras {
        for (i, value) in (0..17).map(|i| (i, i as f64 + 0.25)) {
            let value = match i {
                1 => cam.camera_index as f64,
                12 => cam.width as f64,
                13 => cam.height as f64,
                _ => value,
            };
            buf.write_f64::<LittleEndian>(value).unwrap();
        }
        buf.extend(std::iter::repeat(0u8).take(136));
        buf.extend((0..cam.width * cam.height).map(|p| pixel(spec.frame_index, cam.camera_index, p)));
    }
    buf
}

pub fn recording(specs: &[PositionSpec]) -> Vec<u8> {
    let mut buf = VERSION.to_vec();
    for spec in specs {
        buf.extend(position_bytes(spec));
    }
    buf
}

pub fn write_recording(specs: &[PositionSpec]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&recording(specs)).unwrap();
    file.flush().unwrap();
    file
}

/// Frames `start..end`, one 4x4 camera each: a constant 336-byte stride.
pub fn constant(start: i64, end: i64) -> Vec<PositionSpec> {
    (start..end).map(|f| PositionSpec::new(f, vec![camera(0, 4, 4)])).collect()
}

/// Frames `0..2200` without `1000..1010`; every 7th position carries two
/// cameras and every 11th a smaller image, so strides vary.
pub fn dynamic() -> Vec<PositionSpec> {
    (0..2200)
        .filter(|f| !(1000..1010).contains(f))
        .map(|f| {
            let cameras = if f % 7 == 3 {
                vec![camera(0, 4, 4), camera(1, 4, 4)]
            } else if f % 11 == 5 {
                vec![camera(0, 5, 3)]
            } else {
                vec![camera(0, 4, 4)]
            };
            PositionSpec::new(f, cameras)
        })
        .collect()
}

/// A cursor that counts every read and seek reaching it.
pub struct CountingSource {
    inner: Cursor<Vec<u8>>,
    calls: Rc<Cell<usize>>,
}

impl CountingSource {
    pub fn new(bytes: Vec<u8>) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (Self { inner: Cursor::new(bytes), calls: calls.clone() }, calls)
    }
}

impl Read for CountingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls.set(self.calls.get() + 1);
        self.inner.read(buf)
    }
}

impl Seek for CountingSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.calls.set(self.calls.get() + 1);
        self.inner.seek(pos)
    }
}
