//! Binary primitives: fixed-layout records of little-endian doubles.
//!
//! Every header in a recording is a run of 8-byte IEEE-754 doubles with no
//! type information on disk. Each record type declares a field table of
//! [`FieldSpec`]s; decoding picks the in-memory representation per field:
//!
//! | Kind | Representation |
//! |------|----------------|
//! | `Integer` | double truncated toward zero (counts, indices, sizes) |
//! | `Real` | the double as-is |
//! | `Text` | shortest round-trip decimal rendering of the double |

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read};

use crate::error::{Kw6Error, Result};

/// Width of one on-disk field.
pub const N_BYTES_DOUBLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
}

/// One entry of a record's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn integer(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Integer }
    }

    pub const fn real(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Real }
    }

    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text }
    }
}

/// A decoded field value, tagged with the representation its table chose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn decode(kind: FieldKind, raw: f64) -> Self {
        match kind {
            FieldKind::Integer => FieldValue::Integer(raw as i64),
            FieldKind::Real => FieldValue::Real(raw),
            FieldKind::Text => FieldValue::Text(render_text(raw)),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Real(_) => FieldKind::Real,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    /// The double this value encodes back to.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            FieldValue::Integer(v) => Ok(*v as f64),
            FieldValue::Real(v) => Ok(*v),
            FieldValue::Text(s) => s
                .parse::<f64>()
                .map_err(|_| Kw6Error::Format(format!("text field {s:?} is not numeric"))),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Real(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest decimal that parses back to the same double, keeping a `.0`
/// suffix on integral values. Exponents carry a sign and at least two
/// digits, as the acquisition software prints them (`2.0`, `0.25`,
/// `1e+21`, `1.5e-07`, `nan`).
pub fn render_text(raw: f64) -> String {
    if raw.is_nan() {
        return "nan".to_string();
    }
    let text = format!("{raw:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

/// Truncate an integer-kind field, rejecting values that cannot be one.
pub fn integer_field(name: &str, raw: f64) -> Result<i64> {
    if !raw.is_finite() {
        return Err(Kw6Error::Format(format!("field {name} is not finite ({raw})")));
    }
    Ok(raw as i64)
}

/// Decode `N` consecutive little-endian doubles from the front of `buf`.
pub fn read_doubles<const N: usize>(buf: &[u8]) -> Result<[f64; N]> {
    let needed = N * N_BYTES_DOUBLE;
    if buf.len() < needed {
        return Err(Kw6Error::TruncatedRecord { needed, available: buf.len() });
    }
    let mut out = [0f64; N];
    LittleEndian::read_f64_into(&buf[..needed], &mut out);
    Ok(out)
}

/// Read exactly `N` doubles from a stream.
pub fn read_doubles_from<R: Read, const N: usize>(reader: &mut R) -> Result<[f64; N]> {
    let mut buf = vec![0u8; N * N_BYTES_DOUBLE];
    read_full(reader, &mut buf)?;
    read_doubles::<N>(&buf)
}

/// Fill `buf` completely, reporting how far a short read got.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Kw6Error::TruncatedRecord { needed: buf.len(), available: filled });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Decode a raw field block against its table.
pub fn decode_fields(specs: &[FieldSpec], raw: &[f64]) -> Vec<(&'static str, FieldValue)> {
    specs
        .iter()
        .zip(raw)
        .map(|(spec, &value)| (spec.name, FieldValue::decode(spec.kind, value)))
        .collect()
}

/// Encode values back into their on-disk doubles.
pub fn encode_fields<'a, I>(values: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a FieldValue>,
{
    let mut out = Vec::new();
    for value in values {
        out.write_f64::<LittleEndian>(value.to_f64()?)?;
    }
    Ok(out)
}
