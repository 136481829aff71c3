//! Outgoing bytes.

use std::fmt;

/// One chunk the I/O layer must write before the next one.
///
/// A command with literals is split into several chunks; each chunk after
/// the first is only released once the server has sent its continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Bytes to write.
    pub data: Vec<u8>,
}

impl Transmit {
    pub(crate) const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Lossy text with the line terminator trimmed, for logs.
impl fmt::Display for Transmit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.data);
        f.write_str(text.trim_end_matches("\r\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_trims_the_terminator() {
        let transmit = Transmit::new(b"y0001 NOOP\r\n".to_vec());
        assert_eq!(transmit.to_string(), "y0001 NOOP");
    }
}
