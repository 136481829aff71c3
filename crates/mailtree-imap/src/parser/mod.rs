//! Sans-I/O parser for server responses.
//!
//! - **Lexer**: tokenizes one framed response.
//! - **Response parser**: builds [`Response`] values from tokens.
//!
//! ```
//! use mailtree_imap::parser::{Response, ResponseParser};
//! use mailtree_imap::types::{ResponseCode, Status};
//!
//! let Response::Tagged(done) = ResponseParser::parse(b"y01 OK [UIDNEXT 5] Next UID\r\n").unwrap()
//! else {
//!     panic!("expected a tagged completion");
//! };
//! assert_eq!(done.status, Status::Ok);
//! assert_eq!(done.code, ResponseCode::UidNext);
//! assert_eq!(done.args, vec!["5"]);
//! assert_eq!(done.text, "Next UID");
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyPart, BodyStructure, Envelope, FetchItem, Response, ResponseParser,
    StateResponse, StatusItem, TaggedResponse, UntaggedResponse,
};
