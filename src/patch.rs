//! JSON Pointer (RFC 6901) and JSON Patch (RFC 6902) wire types.
//!
//! A patch is an ordered sequence of operations applied left-to-right.
//! Pointers are parsed eagerly, so a malformed pointer surfaces while the
//! patch is being read, not halfway through compilation.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::GraftError;

/// An RFC 6901 JSON Pointer, held as its decoded segments.
///
/// The empty pointer addresses the document root. The escape rules
/// `~1 → "/"` and `~0 → "~"` are applied after splitting on `/`; any other
/// `~` escape is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    /// The empty pointer (document root).
    pub fn root() -> Self {
        Pointer { segments: Vec::new() }
    }

    pub fn parse(text: &str) -> Result<Self, GraftError> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Err(GraftError::PointerSyntax { pointer: text.to_string() });
        };
        let segments = rest
            .split('/')
            .map(|seg| unescape_segment(seg, text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pointer { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into (parent segments, final segment). `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((parent, last.as_str()))
    }

    /// True when `other` addresses a location strictly inside `self`.
    pub fn contains(&self, other: &Pointer) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

fn unescape_segment(segment: &str, pointer: &str) -> Result<String, GraftError> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(GraftError::PointerSyntax { pointer: pointer.to_string() });
            }
        }
    }
    Ok(out)
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = GraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pointer::parse(s)
    }
}

impl Serialize for Pointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Pointer::parse(&text).map_err(D::Error::custom)
    }
}

/// JSON Patch `add` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOperation {
    pub path: Pointer,
    pub value: Value,
}

/// JSON Patch `remove` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveOperation {
    pub path: Pointer,
}

/// JSON Patch `replace` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOperation {
    pub path: Pointer,
    pub value: Value,
}

/// JSON Patch `move` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub from: Pointer,
    pub path: Pointer,
}

/// JSON Patch `copy` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyOperation {
    pub from: Pointer,
    pub path: Pointer,
}

/// JSON Patch `test` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOperation {
    pub path: Pointer,
    pub value: Value,
}

/// A single RFC 6902 patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add(AddOperation),
    Remove(RemoveOperation),
    Replace(ReplaceOperation),
    Move(MoveOperation),
    Copy(CopyOperation),
    Test(TestOperation),
}

/// Parse a JSON Patch document (an array of operation objects).
///
/// An unknown `op` or a missing required member is `MalformedPatch`.
pub fn parse_patch(text: &str) -> Result<Vec<PatchOperation>, GraftError> {
    serde_json::from_str(text).map_err(|e| GraftError::MalformedPatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pointer_round_trip() {
        let p = Pointer::parse("/a/b/0").unwrap();
        assert_eq!(p.segments(), ["a", "b", "0"]);
        assert_eq!(p.to_string(), "/a/b/0");
    }

    #[test]
    fn pointer_escapes_decode_after_split() {
        let p = Pointer::parse("/a~1b/m~0n").unwrap();
        assert_eq!(p.segments(), ["a/b", "m~n"]);
        assert_eq!(p.to_string(), "/a~1b/m~0n");
    }

    #[test]
    fn empty_pointer_is_root() {
        let p = Pointer::parse("").unwrap();
        assert!(p.is_root());
        assert_eq!(p.to_string(), "");
    }

    #[test]
    fn pointer_must_start_with_slash() {
        assert!(matches!(
            Pointer::parse("a/b"),
            Err(GraftError::PointerSyntax { .. })
        ));
    }

    #[test]
    fn invalid_escape_rejected() {
        assert!(matches!(
            Pointer::parse("/a~2"),
            Err(GraftError::PointerSyntax { .. })
        ));
        assert!(matches!(
            Pointer::parse("/a~"),
            Err(GraftError::PointerSyntax { .. })
        ));
    }

    #[test]
    fn contains_is_strict() {
        let a = Pointer::parse("/a").unwrap();
        let ab = Pointer::parse("/a/b").unwrap();
        assert!(a.contains(&ab));
        assert!(!a.contains(&a));
        assert!(!ab.contains(&a));
    }

    #[test]
    fn patch_wire_format() {
        let ops = parse_patch(
            r#"[
                { "op": "test", "path": "/a", "value": 1 },
                { "op": "move", "from": "/a", "path": "/b" }
            ]"#,
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], PatchOperation::Test(t) if t.path.to_string() == "/a"));
        assert!(matches!(&ops[1], PatchOperation::Move(m) if m.from.to_string() == "/a"));
    }

    #[test]
    fn unknown_op_is_malformed() {
        let err = parse_patch(r#"[{ "op": "merge", "path": "/a" }]"#).unwrap_err();
        assert!(matches!(err, GraftError::MalformedPatch(_)));
    }

    #[test]
    fn missing_member_is_malformed() {
        let err = parse_patch(r#"[{ "op": "add", "path": "/a" }]"#).unwrap_err();
        assert!(matches!(err, GraftError::MalformedPatch(_)));
    }

    #[test]
    fn bad_pointer_in_patch_is_malformed() {
        let err = parse_patch(r#"[{ "op": "remove", "path": "no-slash" }]"#).unwrap_err();
        assert!(matches!(err, GraftError::MalformedPatch(_)));
    }
}
