//! Core IMAP types.
//!
//! Identifiers, flags, status keywords and response codes shared by the parser,
//! the command serializer and the engine built on top of this crate.

#![allow(clippy::missing_const_for_fn)]

mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod status;
mod sequence;

pub use flags::{Flag, FlagOperation, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute};
pub use response_code::{CodeArity, ResponseCode};
pub use status::Status;
pub use sequence::{SeqRange, UidSet};
