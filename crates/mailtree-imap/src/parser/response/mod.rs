//! Response parser.
//!
//! Turns one framed response (a line plus any literals it announced) into a
//! [`Response`].

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyPart, BodyStructure, Envelope, FetchItem, StateResponse, StatusItem,
    TaggedResponse, UntaggedResponse,
};

use crate::parser::lexer::{Lexer, Token, is_atom_char};
use crate::types::{SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_list_response, parse_resp_text, parse_search_response,
    parse_status_response, read_text_until_crlf,
};

pub(crate) use helpers::{find_crlf, parse_flag_list};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Tagged command completion.
    Tagged(TaggedResponse),
    /// Untagged server data.
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text after `+`.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        match input.first() {
            Some(b'*') => {
                let mut lexer = Lexer::new(input);
                lexer.advance();
                Self::parse_untagged(&mut lexer)
            }
            Some(b'+') => {
                let mut lexer = Lexer::new(input);
                lexer.advance();
                Ok(Self::parse_continuation(&mut lexer))
            }
            Some(_) => Self::parse_tagged(input),
            None => Err(Error::Parse {
                position: 0,
                message: "Empty response".to_string(),
            }),
        }
    }

    fn parse_tagged(input: &[u8]) -> Result<Response> {
        let end = input
            .iter()
            .position(|&b| !is_atom_char(b))
            .unwrap_or(input.len());
        if end == 0 || input.get(end) != Some(&b' ') {
            return Err(Error::Parse {
                position: end,
                message: "Expected *, + or a tag".to_string(),
            });
        }
        let tag = String::from_utf8_lossy(&input[..end]).into_owned();

        let mut lexer = Lexer::new(input);
        lexer.skip(end + 1);

        let keyword = lexer.read_atom_string()?;
        let status = Status::parse(keyword)
            .filter(|s| s.is_tagged_completion())
            .ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: format!("Invalid tagged status: {keyword}"),
            })?;
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let resp = parse_resp_text(&mut lexer)?;
        Ok(Response::Tagged(TaggedResponse {
            tag: Tag::new(tag),
            status,
            code: resp.code,
            args: resp.args,
            text: resp.text,
        }))
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(s) => {
                if let Some(status) = Status::parse(s) {
                    if lexer.peek() == Some(b' ') {
                        lexer.advance();
                    }
                    let resp = parse_resp_text(lexer)?;
                    UntaggedResponse::State(StateResponse {
                        status,
                        code: resp.code,
                        args: resp.args,
                        text: resp.text,
                    })
                } else {
                    Self::parse_server_data(lexer, s)?
                }
            }
            Token::Number(n) => Self::parse_message_data(lexer, n)?,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in untagged response: {token:?}"),
                });
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn parse_server_data(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        match keyword.to_ascii_uppercase().as_str() {
            "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_capability_data(lexer)?)),
            "FLAGS" => {
                lexer.expect_space()?;
                Ok(UntaggedResponse::Flags(parse_flag_list(lexer)?))
            }
            "LIST" | "LSUB" => {
                lexer.expect_space()?;
                Ok(UntaggedResponse::List(parse_list_response(lexer)?))
            }
            "SEARCH" => Ok(UntaggedResponse::Search(parse_search_response(lexer)?)),
            "STATUS" => {
                lexer.expect_space()?;
                let (mailbox, items) = parse_status_response(lexer)?;
                Ok(UntaggedResponse::Status { mailbox, items })
            }
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("Unknown untagged response: {keyword}"),
            }),
        }
    }

    fn parse_message_data(lexer: &mut Lexer<'_>, n: u32) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?;

        let seq = || {
            SeqNum::new(n).ok_or_else(|| Error::Parse {
                position: lexer.position(),
                message: "Invalid sequence number 0".to_string(),
            })
        };

        match keyword.to_ascii_uppercase().as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "RECENT" => Ok(UntaggedResponse::Recent(n)),
            "EXPUNGE" => Ok(UntaggedResponse::Expunge(seq()?)),
            "FETCH" => {
                let seq = seq()?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, items })
            }
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("Unknown message data: {keyword}"),
            }),
        }
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let text = read_text_until_crlf(lexer);
        Response::Continuation {
            text: (!text.is_empty()).then_some(text),
        }
    }
}
