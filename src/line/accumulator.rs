//! Line accumulator for console input
//!
//! Accumulates bytes until a line terminator (CR or LF) is received.

use crate::config::console::MAX_LINE_LEN;
use heapless::Vec;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Accumulates incoming bytes and extracts complete lines.
///
/// Lines end at CR or LF, so CRLF terminals produce one line followed by an
/// ignored empty one. A line longer than `MAX_LINE_LEN` is discarded
/// entirely, up to and including its terminator.
pub struct LineAccumulator {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAccumulator {
    /// Create a new empty line accumulator.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(line)` (without its terminator) when a line completes.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, MAX_LINE_LEN>> {
        if byte == CR || byte == LF {
            if self.overflowed {
                self.overflowed = false;
                return None;
            }
            if self.buffer.is_empty() {
                // Empty line or second half of CRLF
                return None;
            }

            return Some(core::mem::take(&mut self.buffer));
        }

        if self.overflowed {
            return None;
        }

        if self.buffer.push(byte).is_err() {
            log::warn!("line: discarding line longer than {} bytes", MAX_LINE_LEN);
            self.buffer.clear();
            self.overflowed = true;
        }

        None
    }

    /// Reset the accumulator, discarding any partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Returns true if no partial line is in progress.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the current number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_all(acc: &mut LineAccumulator, bytes: &[u8]) -> std::vec::Vec<std::vec::Vec<u8>> {
        bytes
            .iter()
            .filter_map(|&b| acc.push(b))
            .map(|line| line.to_vec())
            .collect()
    }

    #[test]
    fn test_single_line() {
        let mut acc = LineAccumulator::new();

        assert!(acc.push(b'h').is_none());
        assert!(acc.push(b'i').is_none());
        assert_eq!(acc.len(), 2);

        let line = acc.push(b'\n').expect("Should return line");
        assert_eq!(line.as_slice(), b"hi");
        assert!(acc.is_empty());
    }

    #[test]
    fn test_crlf_yields_one_line() {
        let mut acc = LineAccumulator::new();

        let lines = push_all(&mut acc, b"help\r\nstatus\r\n");

        assert_eq!(lines, vec![b"help".to_vec(), b"status".to_vec()]);
    }

    #[test]
    fn test_empty_lines_ignored() {
        let mut acc = LineAccumulator::new();

        assert!(push_all(&mut acc, b"\r\n\n\r").is_empty());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_line_split_across_pushes() {
        let mut acc = LineAccumulator::new();

        assert!(push_all(&mut acc, b"par").is_empty());
        let lines = push_all(&mut acc, b"tial\r");

        assert_eq!(lines, vec![b"partial".to_vec()]);
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut acc = LineAccumulator::new();
        let long = [b'x'; MAX_LINE_LEN + 10];

        assert!(push_all(&mut acc, &long).is_empty());
        assert!(acc.push(b'\r').is_none());

        // Next line is unaffected
        let lines = push_all(&mut acc, b"ok\n");
        assert_eq!(lines, vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_reset() {
        let mut acc = LineAccumulator::new();

        push_all(&mut acc, b"abc");
        assert!(!acc.is_empty());

        acc.reset();
        assert!(acc.is_empty());

        let lines = push_all(&mut acc, b"d\n");
        assert_eq!(lines, vec![b"d".to_vec()]);
    }
}
