//! Export of camera frames to grayscale PNG and of position timing to CSV.
//!
//! # Parallel encoding
//!
//! With the `parallel` feature, the cameras of one position are encoded
//! concurrently using Rayon. Positions are still read one at a time since
//! the reader's cursor is not shared.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::camera::CameraRecord;
use crate::error::Result;
use crate::reader::Reader;

/// Encode one camera image as an 8-bit grayscale PNG.
pub fn write_png<W: Write>(writer: W, camera: &CameraRecord) -> Result<()> {
    let mut encoder = png::Encoder::new(writer, camera.width(), camera.height());
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(camera.pixels())?;
    writer.finish()?;
    Ok(())
}

pub fn save_png(path: &Path, camera: &CameraRecord) -> Result<()> {
    let file = File::create(path)?;
    write_png(BufWriter::new(file), camera)
}

/// `{frame_index}_{camera_index}.png`
pub fn png_file_name(frame_index: i64, camera: &CameraRecord) -> String {
    format!("{}_{}.png", frame_index, camera.camera_index())
}

/// Write every camera of every position into `output_dir`.
///
/// Returns the number of images written. A corrupt position ends the
/// export early with a warning; images already written are kept.
pub fn export_pngs<R: Read + Seek>(reader: &mut Reader<R>, output_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = 0usize;
    for position in reader.positions() {
        let position = match position {
            Ok(position) => position,
            Err(e) if e.is_decode_failure() => {
                warn!("Error when reading file, stopping after {written} images: {e}");
                break;
            }
            Err(e) => return Err(e),
        };
        written += save_cameras(output_dir, position.frame_index(), &position.cameras)?;
    }
    debug!("Exported {written} images to {}", output_dir.display());
    Ok(written)
}

fn save_cameras(output_dir: &Path, frame_index: i64, cameras: &[CameraRecord]) -> Result<usize> {
    let jobs: Vec<(PathBuf, &CameraRecord)> = cameras
        .iter()
        .filter(|camera| {
            let empty = camera.pixels().is_empty();
            if empty {
                warn!("Frame {frame_index} camera {} has no pixels", camera.camera_index());
            }
            !empty
        })
        .map(|camera| (output_dir.join(png_file_name(frame_index, camera)), camera))
        .collect();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        jobs.par_iter()
            .map(|(path, camera)| save_png(path, camera))
            .collect::<Result<Vec<()>>>()?;
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (path, camera) in &jobs {
            save_png(path, camera)?;
        }
    }

    Ok(jobs.len())
}

/// Write `frame_index,time` for every position, reading headers only.
pub fn write_positions_csv<R: Read + Seek, W: Write>(reader: &mut Reader<R>, mut out: W) -> Result<usize> {
    let report = reader.scan::<fn(u64, u64)>(None)?;
    writeln!(out, "frame_index,time")?;
    for &(frame_index, _) in &report.frames {
        let header = reader.header(frame_index)?;
        writeln!(out, "{},{}", header.frame_index, header.time)?;
    }
    out.flush()?;
    Ok(report.frames.len())
}
