//! `.hdr` sidecar files written next to a recording by the acquisition
//! software. Each `<kw6Index>` element names a byte offset (`kw6Byte`) and
//! a scaled position counter (`kw6Pos`), either as attributes or as
//! `key = "value"` lines in the element body:
//!
//! ```text
//! <kw6Index>
//! kw6Byte = "19"
//! kw6Pos = "0"
//! </kw6Index>
//! ```
//!
//! Only the offsets are used, to seed a reader's cache.

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Kw6Error, Result};
use crate::index::IndexCache;

/// `kw6Pos` counts ten steps per frame.
pub const DEFAULT_POSITION_DIVISOR: i64 = 10;

const ELEMENT_PATTERN: &str = r"(?s)<kw6Index\b([^>]*?)(?:/>|>(.*?)</kw6Index>)";
const PAIR_PATTERN: &str = r#"(\w+)\s*=\s*"([^"]*)""#;

pub fn read_sidecar<P: AsRef<Path>>(path: P, divisor: i64) -> Result<IndexCache> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let cache = parse_sidecar(&text, divisor)?;
    debug!("Read {} offsets from {}", cache.len(), path.as_ref().display());
    Ok(cache)
}

/// Map `kw6Pos / divisor` to `kw6Byte` for every index element.
pub fn parse_sidecar(text: &str, divisor: i64) -> Result<IndexCache> {
    if divisor <= 0 {
        return Err(Kw6Error::Sidecar(format!("position divisor must be positive, got {divisor}")));
    }
    let element = Regex::new(ELEMENT_PATTERN).map_err(|e| Kw6Error::Sidecar(e.to_string()))?;
    let pair = Regex::new(PAIR_PATTERN).map_err(|e| Kw6Error::Sidecar(e.to_string()))?;

    let mut cache = IndexCache::new();
    for captures in element.captures_iter(text) {
        let attributes = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());

        let values: HashMap<&str, &str> = pair
            .captures_iter(attributes)
            .chain(pair.captures_iter(body))
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();

        let offset: u64 = number(&values, "kw6Byte")?;
        let position: i64 = number(&values, "kw6Pos")?;
        cache.insert(position / divisor, offset);
    }
    Ok(cache)
}

fn number<T: std::str::FromStr>(values: &HashMap<&str, &str>, key: &str) -> Result<T> {
    let raw = values
        .get(key)
        .ok_or_else(|| Kw6Error::Sidecar(format!("kw6Index element without {key}")))?;
    raw.trim()
        .parse()
        .map_err(|_| Kw6Error::Sidecar(format!("{key} value {raw:?} is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDECAR: &str = r#"<?xml version="1.0"?>
<kw6Header>
<kw6Index>
kw6Byte = "19"
kw6Pos = "0"
</kw6Index>
<kw6Index>
kw6Byte = "3379"
kw6Pos = "100"
</kw6Index>
<other>ignored</other>
<kw6Index kw6Pos="200" kw6Byte="6739"/>
</kw6Header>"#;

    #[test]
    fn parses_body_and_attribute_forms() {
        let cache = parse_sidecar(SIDECAR, DEFAULT_POSITION_DIVISOR).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(0), Some(19));
        assert_eq!(cache.get(10), Some(3379));
        assert_eq!(cache.get(20), Some(6739));
    }

    #[test]
    fn divisor_one_keeps_raw_positions() {
        let cache = parse_sidecar(SIDECAR, 1).unwrap();
        assert_eq!(cache.get(100), Some(3379));
    }

    #[test]
    fn missing_key_is_error() {
        let err = parse_sidecar(r#"<kw6Index>kw6Byte = "19"</kw6Index>"#, 10).unwrap_err();
        assert!(matches!(err, Kw6Error::Sidecar(_)));
    }

    #[test]
    fn empty_value_is_error() {
        let err = parse_sidecar(r#"<kw6Index kw6Byte="" kw6Pos="0"/>"#, 10).unwrap_err();
        assert!(matches!(err, Kw6Error::Sidecar(_)));
    }

    #[test]
    fn rejects_non_positive_divisor() {
        assert!(parse_sidecar(SIDECAR, 0).is_err());
    }
}
