use std::io::Read;

use crate::error::{Kw6Error, Result};
use crate::field::read_full;

/// The only version string this reader accepts.
pub const VERSION: &str = "KW6FileClassVer1.0";
/// Bytes reserved for the version string; the first position starts here.
pub const VERSION_SIZE: usize = 19;

/// Trimmed ASCII version string found at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = [0u8; VERSION_SIZE];
        read_full(&mut reader, &mut raw).map_err(|e| match e {
            Kw6Error::TruncatedRecord { available, .. } => Kw6Error::Format(format!(
                "file too short for version tag ({available} of {VERSION_SIZE} bytes)"
            )),
            other => other,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw).map_err(|_| {
            Kw6Error::Format(format!("version tag is not ASCII: {}", hex::encode(raw)))
        })?;
        let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if trimmed != VERSION {
            return Err(Kw6Error::Format(format!("Unexpected file version {trimmed:?}")));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
