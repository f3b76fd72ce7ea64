//! Content hashing of received relation data
//!
//! The digest has to match the one the requiring side computes over the
//! data it sends, so the JSON rendering follows that side's encoder: keys
//! sorted at every level, `", "` and `": "` separators, and everything
//! outside printable ASCII escaped as `\uXXXX`.

use crate::error::Result;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;

/// SHA-256 hex digest of a received-data mapping
pub fn content_hash(data: &Map<String, Value>) -> Result<String> {
    let rendered = canonical_json(data)?;
    let mut hasher = Sha256::new();
    hasher.update(&rendered);
    Ok(hex::encode(hasher.finalize()))
}

/// Canonical JSON bytes the digest is computed over
pub fn canonical_json(data: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    SortedMap(data).serialize(&mut ser)?;
    Ok(out)
}

/// Serializes objects with their keys in sorted order regardless of how
/// the underlying map iterates.
struct Sorted<'a>(&'a Value);

struct SortedMap<'a>(&'a Map<String, Value>);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => SortedMap(map).serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Sorted(item))?;
                }
                seq.end()
            }
            other => other.serialize(serializer),
        }
    }
}

impl Serialize for SortedMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&str, &Value> =
            self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let mut map = serializer.serialize_map(Some(sorted.len()))?;
        for (key, value) in sorted {
            map.serialize_entry(key, &Sorted(value))?;
        }
        map.end()
    }
}

struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn render(value: Value) -> String {
        String::from_utf8(canonical_json(&data(value)).unwrap()).unwrap()
    }

    #[test]
    fn test_rendering_matches_requirer_encoding() {
        assert_eq!(
            render(json!({"region": "us-east-1", "instance-id": "i-1", "requested": true})),
            r#"{"instance-id": "i-1", "region": "us-east-1", "requested": true}"#
        );
        assert_eq!(
            render(json!({"patterns": ["a", "b"], "tags": {"z": null, "a": "x"}})),
            r#"{"patterns": ["a", "b"], "tags": {"a": "x", "z": null}}"#
        );
        assert_eq!(render(json!({})), "{}");
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        assert_eq!(render(json!({"t": "é"})), r#"{"t": "\u00e9"}"#);
        assert_eq!(render(json!({"t": "😀"})), r#"{"t": "\ud83d\ude00"}"#);
        assert_eq!(render(json!({"t": "\u{7f}"})), r#"{"t": "\u007f"}"#);
        assert_eq!(render(json!({"t": "a\"b\n"})), r#"{"t": "a\"b\n"}"#);
    }

    #[test]
    fn test_hash_is_order_independent() {
        let mut forward = Map::new();
        forward.insert("a".to_string(), json!(1));
        forward.insert("b".to_string(), json!({"y": 2, "x": 1}));
        let mut backward = Map::new();
        backward.insert("b".to_string(), json!({"x": 1, "y": 2}));
        backward.insert("a".to_string(), json!(1));

        assert_eq!(content_hash(&forward).unwrap(), content_hash(&backward).unwrap());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(&Map::new()).unwrap();
        assert_eq!(hash.len(), 64);
        // sha256("{}")
        assert_eq!(
            hash,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_any_change_changes_hash() {
        let before = content_hash(&data(json!({"enable-dns-management": true}))).unwrap();
        let after = content_hash(&data(json!({"enable-dns-management": false}))).unwrap();
        assert_ne!(before, after);
    }
}
