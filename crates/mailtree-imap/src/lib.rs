//! # mailtree-imap
//!
//! The wire layer of the mailtree engine: a sans-I/O IMAP connection plus the
//! transports that carry it.
//!
//! ## Features
//!
//! - **Sans-I/O connection**: tag generation, command serialization, response
//!   framing with literal continuation, command/response correlation and the
//!   connection-state machine, all without touching a socket
//! - **Tolerant parser**: malformed responses become events and parsing
//!   resumes at the next response boundary
//! - **Transports**: plain TCP, implicit TLS via rustls, or a subprocess
//!   speaking IMAP on its stdin/stdout
//!
//! ## Quick Start
//!
//! ```
//! use mailtree_imap::{Command, Connection, ConnectionEvent, Mailbox};
//!
//! let mut conn = Connection::new();
//! conn.handle_connected();
//! conn.handle_input(b"* OK [CAPABILITY IMAP4rev1 MOVE] hello\r\n");
//! assert!(conn.has_capability("MOVE"));
//!
//! let tag = conn.send(&Command::Select { mailbox: Mailbox::inbox() }).unwrap();
//! let outgoing = conn.poll_transmit().unwrap();
//! assert_eq!(outgoing.data, format!("{tag} SELECT INBOX\r\n").into_bytes());
//!
//! while let Some(event) = conn.poll_event() {
//!     if let ConnectionEvent::LineSent(line) = event {
//!         println!("C: {line}");
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: commands the engine issues, and the tag generator
//! - [`connection`]: transport configuration and stream providers
//! - [`parser`]: response lexer and parser
//! - [`protocol`]: the sans-I/O [`Connection`]
//! - [`types`]: identifiers, flags, mailboxes, response codes

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::{Command, FetchAttribute, MessageSet, StatusAttribute, TagGenerator};
pub use connection::{Config, ConfigBuilder, ImapStream, Security, Transport};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, TaggedResponse, UntaggedResponse};
pub use protocol::{AccessMode, Connection, ConnectionEvent, ConnectionState, Transmit};
pub use types::{
    Flag, FlagOperation, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum,
    SeqRange, Status, Tag, Uid, UidSet, UidValidity,
};
