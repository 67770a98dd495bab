use serde::Serialize;
use std::io::Read;

use crate::camera::CameraRecord;
use crate::error::{Kw6Error, Result};
use crate::field::{
    encode_fields, integer_field, read_doubles, read_doubles_from, render_text, FieldSpec,
    FieldValue, N_BYTES_DOUBLE,
};

/// Position header fields, in wire order.
pub const POSITION_FIELDS: [FieldSpec; 6] = [
    FieldSpec::integer("n_frame_bytes"),
    FieldSpec::text("camera_version"),
    FieldSpec::integer("frame_index"),
    FieldSpec::text("time"),
    FieldSpec::text("pulses"),
    FieldSpec::integer("n_active_cameras"),
];

pub const POSITION_HEADER_SIZE: usize = N_BYTES_DOUBLE * POSITION_FIELDS.len();
/// More cameras than this in one position means the header is garbage.
pub const MAX_ACTIVE_CAMERAS: i64 = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionHeader {
    /// Declared byte length of the whole position, header included.
    pub n_frame_bytes: u64,
    pub camera_version: String,
    pub frame_index: i64,
    pub time: String,
    pub pulses: String,
    pub n_active_cameras: u32,
}

impl PositionHeader {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::from_raw(read_doubles::<6>(buf)?)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        Self::from_raw(read_doubles_from::<_, 6>(reader)?)
    }

    fn from_raw(raw: [f64; 6]) -> Result<Self> {
        let [n_frame_bytes, camera_version, frame_index, time, pulses, n_active_cameras] = raw;

        let n_frame_bytes = integer_field("n_frame_bytes", n_frame_bytes)?;
        if n_frame_bytes < POSITION_HEADER_SIZE as i64 {
            return Err(Kw6Error::Format(format!(
                "declared position length {n_frame_bytes} is shorter than its header"
            )));
        }
        let n_active_cameras = integer_field("n_active_cameras", n_active_cameras)?;
        if !(0..=MAX_ACTIVE_CAMERAS).contains(&n_active_cameras) {
            return Err(Kw6Error::Format(format!(
                "implausible active camera count {n_active_cameras}"
            )));
        }

        Ok(Self {
            n_frame_bytes: n_frame_bytes as u64,
            camera_version: render_text(camera_version),
            frame_index: integer_field("frame_index", frame_index)?,
            time: render_text(time),
            pulses: render_text(pulses),
            n_active_cameras: n_active_cameras as u32,
        })
    }

    /// Tagged field list in wire order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let values = [
            FieldValue::Integer(self.n_frame_bytes as i64),
            FieldValue::Text(self.camera_version.clone()),
            FieldValue::Integer(self.frame_index),
            FieldValue::Text(self.time.clone()),
            FieldValue::Text(self.pulses.clone()),
            FieldValue::Integer(self.n_active_cameras as i64),
        ];
        POSITION_FIELDS.iter().map(|spec| spec.name).zip(values).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_fields(self.fields().iter().map(|(_, value)| value))
    }
}

/// A position header and the camera records that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub header: PositionHeader,
    pub cameras: Vec<CameraRecord>,
}

impl PositionRecord {
    /// Decode a full position. Consumes exactly the bytes the header and
    /// camera fields describe; `n_frame_bytes` is not consulted.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = PositionHeader::read(reader)?;
        Self::read_cameras(header, reader)
    }

    pub(crate) fn read_cameras<R: Read>(header: PositionHeader, reader: &mut R) -> Result<Self> {
        let cameras = (0..header.n_active_cameras)
            .map(|_| CameraRecord::read(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { header, cameras })
    }

    pub fn frame_index(&self) -> i64 {
        self.header.frame_index
    }

    /// Bytes actually occupied on disk, which may disagree with `n_frame_bytes`.
    pub fn structural_len(&self) -> u64 {
        POSITION_HEADER_SIZE as u64
            + self.cameras.iter().map(|c| c.header.record_len()).sum::<u64>()
    }

    pub fn camera(&self, camera_index: i64) -> Option<&CameraRecord> {
        self.cameras.iter().find(|c| c.camera_index() == camera_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use proptest::prelude::*;

    fn raw(fields: [f64; 6]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(POSITION_HEADER_SIZE);
        for value in fields {
            buf.write_f64::<LittleEndian>(value).unwrap();
        }
        buf
    }

    #[test]
    fn decodes_fields_in_order() {
        let header = PositionHeader::from_bytes(&raw([48.0, 3.0, 17.0, 12.25, 900.0, 0.0])).unwrap();
        assert_eq!(header.n_frame_bytes, 48);
        assert_eq!(header.camera_version, "3.0");
        assert_eq!(header.frame_index, 17);
        assert_eq!(header.time, "12.25");
        assert_eq!(header.pulses, "900.0");
        assert_eq!(header.n_active_cameras, 0);
    }

    #[test]
    fn header_without_cameras_reads_no_payload() {
        let bytes = raw([48.0, 1.0, 4.0, 0.0, 0.0, 0.0]);
        let mut src = &bytes[..];
        let position = PositionRecord::read(&mut src).unwrap();
        assert!(position.cameras.is_empty());
        assert_eq!(position.structural_len(), 48);
    }

    #[test]
    fn rejects_malformed_counts() {
        for fields in [
            [48.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            [48.0, 1.0, 0.0, 0.0, 0.0, 5000.0],
            [10.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            [48.0, 1.0, f64::NAN, 0.0, 0.0, 0.0],
        ] {
            let err = PositionHeader::from_bytes(&raw(fields)).unwrap_err();
            assert!(matches!(err, Kw6Error::Format(_)), "{fields:?}");
        }
    }

    #[test]
    fn truncated_header() {
        let err = PositionHeader::from_bytes(&[0u8; 47]).unwrap_err();
        assert!(matches!(err, Kw6Error::TruncatedRecord { needed: 48, available: 47 }));
    }

    fn finite() -> impl Strategy<Value = f64> {
        any::<f64>().prop_filter("finite", |v| v.is_finite())
    }

    proptest! {
        #[test]
        fn header_round_trips(
            n_frame_bytes in 48u64..(1u64 << 40),
            camera_version in finite(),
            frame_index in -(1i64 << 50)..(1i64 << 50),
            time in finite(),
            pulses in finite(),
            n_active_cameras in 0u32..=MAX_ACTIVE_CAMERAS as u32,
        ) {
            let bytes = raw([
                n_frame_bytes as f64,
                camera_version,
                frame_index as f64,
                time,
                pulses,
                n_active_cameras as f64,
            ]);
            let header = PositionHeader::from_bytes(&bytes).unwrap();
            prop_assert_eq!(header.frame_index, frame_index);
            prop_assert_eq!(header.to_bytes().unwrap(), bytes);
        }
    }
}
