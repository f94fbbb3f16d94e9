//! Growable byte buffer for incremental frame extraction.

use crate::constants::{BUF_CHUNK, MAX_BUFFER_SIZE};
use crate::error::{AmiError, AmiResult};

/// Byte buffer with a consumed-prefix offset.
///
/// The reader appends raw socket data with [`extend_from_slice`](Self::extend_from_slice);
/// the parser consumes it with [`extract_until_pattern`](Self::extract_until_pattern).
/// Consumed bytes stay in place until [`compact`](Self::compact) drops them,
/// so extraction never shifts memory on the hot path.
#[derive(Debug)]
pub(crate) struct AmiBuffer {
    data: Vec<u8>,
    /// Offset of the first unconsumed byte.
    pos: usize,
}

impl AmiBuffer {
    pub(crate) fn new() -> Self {
        Self {
            data: Vec::with_capacity(BUF_CHUNK),
            pos: 0,
        }
    }

    /// Append raw bytes from the socket.
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Number of unconsumed bytes.
    pub(crate) fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail if the buffer has grown past the safety limit.
    pub(crate) fn check_size_limits(&self) -> AmiResult<()> {
        if self.len() > MAX_BUFFER_SIZE {
            return Err(AmiError::protocol_error(format!(
                "receive buffer exceeded {} bytes, peer is misbehaving",
                MAX_BUFFER_SIZE
            )));
        }
        Ok(())
    }

    /// Extract all bytes up to (but not including) `pattern`, consuming the
    /// pattern as well. Returns `None` if the pattern is not present.
    pub(crate) fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        let haystack = &self.data[self.pos..];
        let at = find_subslice(haystack, pattern)?;
        let out = haystack[..at].to_vec();
        self.pos += at + pattern.len();
        Some(out)
    }

    /// Drop consumed bytes, shifting the remainder to the front.
    pub(crate) fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.data.drain(..self.pos);
        self.pos = 0;
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_simple_pattern() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"hello\r\nworld\r\n");

        assert_eq!(buf.extract_until_pattern(b"\r\n"), Some(b"hello".to_vec()));
        assert_eq!(buf.extract_until_pattern(b"\r\n"), Some(b"world".to_vec()));
        assert_eq!(buf.extract_until_pattern(b"\r\n"), None);
    }

    #[test]
    fn extract_across_appends() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"partial");
        assert_eq!(buf.extract_until_pattern(b"\r\n"), None);

        buf.extend_from_slice(b" line\r\nrest");
        assert_eq!(
            buf.extract_until_pattern(b"\r\n"),
            Some(b"partial line".to_vec())
        );
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn compact_preserves_remainder() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"one\r\ntwo");
        buf.extract_until_pattern(b"\r\n").unwrap();
        buf.compact();

        buf.extend_from_slice(b"\r\n");
        assert_eq!(buf.extract_until_pattern(b"\r\n"), Some(b"two".to_vec()));
    }

    #[test]
    fn size_limit_enforced() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(&vec![b'x'; MAX_BUFFER_SIZE + 1]);
        assert!(buf.check_size_limits().is_err());
    }

    #[test]
    fn empty_pattern_never_matches() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"data");
        assert_eq!(buf.extract_until_pattern(b""), None);
    }
}
