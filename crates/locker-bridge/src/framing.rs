//! Line reassembly for the locker byte stream.

use crate::error::{BridgeError, BridgeResult};
use bridge_config_and_utils::SessionConfig;
use tracing::warn;

/// Splits an incoming byte stream into text lines.
///
/// A `\r` directly before the terminator is dropped. Lines that are not
/// valid UTF-8, and lines longer than `max_line_len`, are discarded and
/// the stream carries on.
#[derive(Debug)]
pub struct LineFramer {
    terminator: u8,
    max_line_len: usize,
    buf: Vec<u8>,
    /// Set once the current line has overflowed; cleared at the next terminator.
    discarding: bool,
}

impl LineFramer {
    pub fn new(terminator: u8, max_line_len: usize) -> Self {
        Self {
            terminator,
            max_line_len,
            buf: Vec::with_capacity(max_line_len.min(1024)),
            discarding: false,
        }
    }

    /// Build a framer from session settings. The terminator must be ASCII.
    pub fn from_config(config: &SessionConfig) -> BridgeResult<Self> {
        let terminator = u8::try_from(config.line_terminator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                BridgeError::Config(format!(
                    "line terminator {:?} is not a single ASCII byte",
                    config.line_terminator
                ))
            })?;
        Ok(Self::new(terminator, config.max_line_len))
    }

    /// Feed bytes, returning every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if byte == self.terminator {
                if let Some(line) = self.finish_line() {
                    lines.push(line);
                }
                continue;
            }

            if self.discarding {
                continue;
            }

            self.buf.push(byte);
            if self.buf.len() > self.max_line_len {
                warn!(
                    max_line_len = self.max_line_len,
                    "Line too long, discarding until next terminator"
                );
                self.buf.clear();
                self.discarding = true;
            }
        }

        lines
    }

    /// Drop any partial line, e.g. after the link went away.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Bytes of the line being assembled.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    fn finish_line(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) {
            self.buf.clear();
            return None;
        }

        let mut raw = std::mem::take(&mut self.buf);
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }

        match String::from_utf8(raw) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(
                    bytes = e.as_bytes().len(),
                    "Discarding line with invalid UTF-8"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> LineFramer {
        LineFramer::new(b'\n', 16)
    }

    #[test]
    fn test_single_line() {
        let mut framer = framer();
        assert_eq!(framer.push(b"BORROW,12345678\n"), vec!["BORROW,12345678"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut framer = framer();
        assert!(framer.push(b"RETU").is_empty());
        assert!(framer.push(b"RN,1234").is_empty());
        assert_eq!(framer.push(b"5678\nBO"), vec!["RETURN,12345678"]);
        assert_eq!(framer.pending_len(), 2);
    }

    #[test]
    fn test_multiple_lines_in_one_read() {
        let mut framer = framer();
        assert_eq!(framer.push(b"a\nb\n\nc\n"), vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_strips_carriage_return() {
        let mut framer = framer();
        assert_eq!(framer.push(b"12345678\r\n"), vec!["12345678"]);
        // Only the one directly before the terminator
        assert_eq!(framer.push(b"\r1\r\n"), vec!["\r1"]);
    }

    #[test]
    fn test_invalid_utf8_is_discarded() {
        let mut framer = framer();
        assert_eq!(framer.push(b"\xff\xfe\nok\n"), vec!["ok"]);
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut framer = framer();
        assert!(framer.push(b"0123456789abcdefXYZ").is_empty());
        assert_eq!(framer.pending_len(), 0);
        assert!(framer.push(b"more\n").is_empty());
        assert_eq!(framer.push(b"next\n"), vec!["next"]);
    }

    #[test]
    fn test_exact_max_length_is_kept() {
        let mut framer = framer();
        assert_eq!(
            framer.push(b"0123456789abcdef\n"),
            vec!["0123456789abcdef"]
        );
    }

    #[test]
    fn test_custom_terminator() {
        let mut framer = LineFramer::new(b';', 16);
        assert_eq!(framer.push(b"a;b\n;"), vec!["a", "b\n"]);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut framer = framer();
        framer.push(b"half");
        framer.reset();
        assert_eq!(framer.push(b"whole\n"), vec!["whole"]);
    }

    #[test]
    fn test_from_config_rejects_non_ascii() {
        let config = SessionConfig {
            line_terminator: 'é',
            ..Default::default()
        };
        assert!(matches!(
            LineFramer::from_config(&config),
            Err(BridgeError::Config(_))
        ));

        let framer = LineFramer::from_config(&SessionConfig::default()).unwrap();
        assert_eq!(framer.terminator, b'\n');
        assert_eq!(framer.max_line_len, 256);
    }
}
