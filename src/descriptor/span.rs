//! Half-open key spans

use std::fmt;

use serde::{Deserialize, Serialize};

/// A half-open key span `[start, end)`.
///
/// Invariant: `start < end`. Construct through [`KeySpan::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySpan {
    start: Vec<u8>,
    end: Vec<u8>,
}

impl KeySpan {
    /// Returns `None` unless `start < end`.
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Option<Self> {
        let start = start.into();
        let end = end.into();
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> &[u8] {
        &self.start
    }

    pub fn end(&self) -> &[u8] {
        &self.end
    }

    /// True if the two spans share at least one key.
    pub fn overlaps(&self, other: &KeySpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.start.as_slice() <= key && key < self.end.as_slice()
    }
}

impl fmt::Display for KeySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            String::from_utf8_lossy(&self.start),
            String::from_utf8_lossy(&self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(a: &str, b: &str) -> KeySpan {
        KeySpan::new(a.as_bytes(), b.as_bytes()).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(KeySpan::new("a", "a").is_none());
        assert!(KeySpan::new("b", "a").is_none());
        assert!(KeySpan::new("", "a").is_some());
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        assert!(!span("a", "c").overlaps(&span("c", "e")));
        assert!(!span("c", "e").overlaps(&span("a", "c")));
    }

    #[test]
    fn test_overlap_cases() {
        assert!(span("a", "d").overlaps(&span("c", "e")));
        assert!(span("a", "z").overlaps(&span("m", "n")));
        assert!(span("m", "n").overlaps(&span("a", "z")));
    }

    #[test]
    fn test_contains_key_is_half_open() {
        let s = span("b", "d");
        assert!(s.contains_key(b"b"));
        assert!(s.contains_key(b"c"));
        assert!(!s.contains_key(b"d"));
        assert!(!s.contains_key(b"a"));
    }

    #[test]
    fn test_display() {
        assert_eq!(span("a", "b").to_string(), "[a, b)");
    }
}
