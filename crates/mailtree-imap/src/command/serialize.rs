//! Command serialization helpers.

use crate::types::{Flags, Mailbox};

use super::types::FetchAttribute;

/// Accumulates command bytes, splitting at synchronizing literals.
///
/// Every chunk but the last ends with a `{n}\r\n` announcement; the next chunk
/// may only be written after the server answered with a continuation.
#[derive(Debug, Default)]
pub struct CommandWriter {
    buf: Vec<u8>,
    chunks: Vec<Vec<u8>>,
}

impl CommandWriter {
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes an astring as atom, quoted string or literal.
    pub fn astring(&mut self, s: &str) {
        if !s.is_empty() && s.bytes().all(is_plain_atom_byte) {
            self.raw(s.as_bytes());
        } else if s.bytes().all(is_quotable) {
            self.buf.push(b'"');
            for b in s.bytes() {
                if b == b'"' || b == b'\\' {
                    self.buf.push(b'\\');
                }
                self.buf.push(b);
            }
            self.buf.push(b'"');
        } else {
            self.literal(s.as_bytes());
        }
    }

    pub fn mailbox(&mut self, mailbox: &Mailbox) {
        self.astring(mailbox.as_str());
    }

    pub fn literal(&mut self, data: &[u8]) {
        self.raw(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.chunks.push(std::mem::take(&mut self.buf));
        self.raw(data);
    }

    pub fn flags(&mut self, flags: &Flags) {
        self.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.push(b' ');
            }
            self.raw(flag.as_str().as_bytes());
        }
        self.push(b')');
    }

    pub fn fetch_attributes(&mut self, attrs: &[FetchAttribute]) {
        if let [single] = attrs {
            self.fetch_attribute(single);
            return;
        }
        self.push(b'(');
        for (i, attr) in attrs.iter().enumerate() {
            if i > 0 {
                self.push(b' ');
            }
            self.fetch_attribute(attr);
        }
        self.push(b')');
    }

    fn fetch_attribute(&mut self, attr: &FetchAttribute) {
        match attr {
            FetchAttribute::Flags => self.raw(b"FLAGS"),
            FetchAttribute::InternalDate => self.raw(b"INTERNALDATE"),
            FetchAttribute::Rfc822Size => self.raw(b"RFC822.SIZE"),
            FetchAttribute::Envelope => self.raw(b"ENVELOPE"),
            FetchAttribute::BodyStructure => self.raw(b"BODYSTRUCTURE"),
            FetchAttribute::Uid => self.raw(b"UID"),
            FetchAttribute::Body { section, peek } => {
                let open: &[u8] = if *peek { b"BODY.PEEK[" } else { b"BODY[" };
                self.raw(open);
                if let Some(s) = section {
                    self.raw(s.as_bytes());
                }
                self.push(b']');
            }
        }
    }

    /// Terminates the command and returns its chunks.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.raw(b"\r\n");
        self.chunks.push(self.buf);
        self.chunks
    }
}

const fn is_plain_atom_byte(b: u8) -> bool {
    b > 0x20
        && b < 0x7F
        && !matches!(b, b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']')
}

const fn is_quotable(b: u8) -> bool {
    b >= 0x20 && b < 0x7F
}
