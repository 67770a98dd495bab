//! Camera records: a calibration header in a fixed 34-field slot followed by
//! an 8-bit grayscale image, row-major, `width * height` bytes.

use serde::Serialize;
use std::io::Read;

use crate::error::{Kw6Error, Result};
use crate::field::{
    encode_fields, integer_field, read_doubles, read_doubles_from, read_full,
    render_text, FieldSpec, FieldValue, N_BYTES_DOUBLE,
};

/// Declared camera header fields, in wire order.
pub const CAMERA_FIELDS: [FieldSpec; 17] = [
    FieldSpec::text("camera_version"),
    FieldSpec::integer("camera_index"),
    FieldSpec::text("scale_height"),
    FieldSpec::text("scale_length"),
    FieldSpec::real("xMM"),
    FieldSpec::real("yMM"),
    FieldSpec::real("xPixC"),
    FieldSpec::real("yPixC"),
    FieldSpec::text("sub_sample"),
    FieldSpec::real("expoMS"),
    FieldSpec::text("x0"),
    FieldSpec::text("y0"),
    FieldSpec::integer("width"),
    FieldSpec::integer("height"),
    FieldSpec::text("10xReserved"),
    FieldSpec::text("5xWearLeft"),
    FieldSpec::text("5xWearRight"),
];

pub const CAMERA_HEADER_FIELDS: usize = CAMERA_FIELDS.len();
/// Doubles reserved for a camera header on disk.
pub const CAMERA_SLOT_FIELDS: usize = 34;
pub const CAMERA_PADDING_BYTES: usize = N_BYTES_DOUBLE * (CAMERA_SLOT_FIELDS - CAMERA_HEADER_FIELDS);
/// Header plus padding; the image starts this many bytes into the record.
pub const CAMERA_SLOT_BYTES: usize = N_BYTES_DOUBLE * CAMERA_SLOT_FIELDS;
/// Largest width or height accepted before a header is considered corrupt.
pub const MAX_IMAGE_DIMENSION: i64 = 65_536;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraHeader {
    pub camera_version: String,
    pub camera_index: i64,
    pub scale_height: String,
    pub scale_length: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub x_pix_c: f64,
    pub y_pix_c: f64,
    pub sub_sample: String,
    pub expo_ms: f64,
    pub x0: String,
    pub y0: String,
    pub width: u32,
    pub height: u32,
    pub reserved: String,
    pub wear_left: String,
    pub wear_right: String,
}

impl CameraHeader {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::from_raw(read_doubles::<CAMERA_HEADER_FIELDS>(buf)?)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        Self::from_raw(read_doubles_from::<_, CAMERA_HEADER_FIELDS>(reader)?)
    }

    fn from_raw(raw: [f64; CAMERA_HEADER_FIELDS]) -> Result<Self> {
        let [camera_version, camera_index, scale_height, scale_length, x_mm, y_mm, x_pix_c, y_pix_c, sub_sample, expo_ms, x0, y0, width, height, reserved, wear_left, wear_right] =
            raw;
        Ok(Self {
            camera_version: render_text(camera_version),
            camera_index: integer_field("camera_index", camera_index)?,
            scale_height: render_text(scale_height),
            scale_length: render_text(scale_length),
            x_mm,
            y_mm,
            x_pix_c,
            y_pix_c,
            sub_sample: render_text(sub_sample),
            expo_ms,
            x0: render_text(x0),
            y0: render_text(y0),
            width: dimension("width", width)?,
            height: dimension("height", height)?,
            reserved: render_text(reserved),
            wear_left: render_text(wear_left),
            wear_right: render_text(wear_right),
        })
    }

    /// Tagged field list in wire order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let values = [
            FieldValue::Text(self.camera_version.clone()),
            FieldValue::Integer(self.camera_index),
            FieldValue::Text(self.scale_height.clone()),
            FieldValue::Text(self.scale_length.clone()),
            FieldValue::Real(self.x_mm),
            FieldValue::Real(self.y_mm),
            FieldValue::Real(self.x_pix_c),
            FieldValue::Real(self.y_pix_c),
            FieldValue::Text(self.sub_sample.clone()),
            FieldValue::Real(self.expo_ms),
            FieldValue::Text(self.x0.clone()),
            FieldValue::Text(self.y0.clone()),
            FieldValue::Integer(self.width as i64),
            FieldValue::Integer(self.height as i64),
            FieldValue::Text(self.reserved.clone()),
            FieldValue::Text(self.wear_left.clone()),
            FieldValue::Text(self.wear_right.clone()),
        ];
        CAMERA_FIELDS.iter().map(|spec| spec.name).zip(values).collect()
    }

    /// Re-encode the declared fields (without slot padding).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_fields(self.fields().iter().map(|(_, value)| value))
    }

    pub fn image_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes this camera occupies on disk.
    pub fn record_len(&self) -> u64 {
        (CAMERA_SLOT_BYTES + self.image_len()) as u64
    }
}

fn dimension(name: &str, raw: f64) -> Result<u32> {
    let value = integer_field(name, raw)?;
    if !(0..=MAX_IMAGE_DIMENSION).contains(&value) {
        return Err(Kw6Error::Format(format!("camera {name} {value} is out of bounds")));
    }
    Ok(value as u32)
}

/// One camera's header and grayscale pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    pub header: CameraHeader,
    pub image: Vec<u8>,
}

impl CameraRecord {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = CameraHeader::read(reader)?;

        let mut padding = [0u8; CAMERA_PADDING_BYTES];
        read_full(reader, &mut padding)?;

        let needed = header.image_len();
        let mut image = Vec::new();
        reader.by_ref().take(needed as u64).read_to_end(&mut image)?;
        if image.len() < needed {
            return Err(Kw6Error::TruncatedRecord { needed, available: image.len() });
        }
        Ok(Self { header, image })
    }

    pub fn camera_index(&self) -> i64 {
        self.header.camera_index
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.image
    }

    /// Row `y` of the image, if in bounds.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height() {
            return None;
        }
        let width = self.width() as usize;
        let start = y as usize * width;
        self.image.get(start..start + width)
    }

    pub fn crc32(&self) -> u32 {
        crc32fast::hash(&self.image)
    }
}
