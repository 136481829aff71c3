//! Incremental response framing.
//!
//! Responses are CRLF-terminated lines, except that a line ending in `{n}`
//! announces `n` raw bytes which belong to the same response. The framer
//! switches to literal mode for exactly those bytes and then resumes looking
//! for the next line terminator.

use bytes::{Buf, BytesMut};

use crate::parser::response::find_crlf;

/// Maximum line length before the buffered bytes are given up on.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Literals above this size are skipped rather than buffered.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// A complete unit of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One response, including its literals and final CRLF.
    Response(Vec<u8>),
    /// Bytes that could not be framed; parsing resumes after them.
    Malformed(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Line,
    Literal { remaining: usize },
    Discard { remaining: usize },
}

/// Sans-I/O framer fed with arbitrary chunks of the byte stream.
#[derive(Debug)]
pub struct ResponseFramer {
    buf: BytesMut,
    current: Vec<u8>,
    mode: Mode,
    oversized: bool,
}

impl Default for ResponseFramer {
    fn default() -> Self {
        Self {
            buf: BytesMut::with_capacity(8192),
            current: Vec::new(),
            mode: Mode::Line,
            oversized: false,
        }
    }
}

impl ResponseFramer {
    /// Appends received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns true if part of a response is buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || !self.current.is_empty()
    }

    /// Returns the next complete frame, if enough bytes have arrived.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.mode {
                Mode::Line => {
                    let Some(pos) = find_crlf(&self.buf) else {
                        if self.buf.len() > MAX_LINE_LENGTH {
                            self.current.extend_from_slice(&self.buf.split());
                            return Some(self.finish(true));
                        }
                        return None;
                    };
                    let line = self.buf.split_to(pos + 2);
                    self.current.extend_from_slice(&line);
                    match parse_literal_length(&line) {
                        Some(n) if n > MAX_LITERAL_SIZE => {
                            self.mode = Mode::Discard { remaining: n };
                        }
                        Some(n) => self.mode = Mode::Literal { remaining: n },
                        None => {
                            let oversized = self.oversized;
                            return Some(self.finish(oversized));
                        }
                    }
                }
                Mode::Literal { remaining } => {
                    let n = remaining.min(self.buf.len());
                    self.current.extend_from_slice(&self.buf.split_to(n));
                    if !self.advance_literal(remaining, n) {
                        return None;
                    }
                }
                Mode::Discard { remaining } => {
                    let n = remaining.min(self.buf.len());
                    self.buf.advance(n);
                    self.oversized = true;
                    if !self.advance_literal(remaining, n) {
                        return None;
                    }
                }
            }
        }
    }

    /// Consumes `n` literal bytes; returns false while more are needed.
    fn advance_literal(&mut self, remaining: usize, n: usize) -> bool {
        let left = remaining - n;
        let discard = matches!(self.mode, Mode::Discard { .. });
        self.mode = match (left, discard) {
            (0, _) => Mode::Line,
            (left, false) => Mode::Literal { remaining: left },
            (left, true) => Mode::Discard { remaining: left },
        };
        left == 0
    }

    fn finish(&mut self, malformed: bool) -> Frame {
        self.oversized = false;
        self.mode = Mode::Line;
        let bytes = std::mem::take(&mut self.current);
        if malformed {
            Frame::Malformed(bytes)
        } else {
            Frame::Response(bytes)
        }
    }
}

/// Parses a literal announcement `{n}` (or `{n+}`) at the end of a line.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
