//! `FETCH` data items.
//!
//! Only the attributes the engine requests are decoded. Anything else a
//! server volunteers (`MODSEQ`, `X-GM-LABELS`, ...) is stepped over token by
//! token so that quoted strings and literals inside it cannot derail the
//! parser.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::Result;

use super::parse_flag_list;
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses the parenthesized `msg-att` list following `* n FETCH`.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            Token::Eof | Token::Crlf => {
                return Err(lexer.error("FETCH attribute list not closed"));
            }
            other => {
                return Err(lexer.error(&format!("Expected FETCH attribute, got {other:?}")));
            }
        };
        if let Some(item) = parse_item(lexer, &name)? {
            items.push(item);
        }
    }
}

fn parse_item(lexer: &mut Lexer<'_>, name: &str) -> Result<Option<FetchItem>> {
    // `BODY` without a section is the non-extensible form of BODYSTRUCTURE
    let structure = name == "BODYSTRUCTURE" || (name == "BODY" && lexer.peek() == Some(b' '));
    if structure {
        lexer.expect_space()?;
        return parse_body_structure(lexer).map(|b| Some(FetchItem::BodyStructure(b)));
    }

    let section = read_enclosed(lexer, b'[', b']');
    let origin = read_enclosed(lexer, b'<', b'>').and_then(|o| o.parse().ok());
    lexer.expect_space()?;

    let item = match name {
        "UID" => {
            let n = lexer.read_number()?;
            let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH response"))?;
            FetchItem::Uid(uid)
        }
        "FLAGS" => FetchItem::Flags(parse_flag_list(lexer)?),
        "RFC822.SIZE" => FetchItem::Rfc822Size(lexer.read_number()?),
        "INTERNALDATE" => match lexer.read_nstring()? {
            Some(date) => FetchItem::InternalDate(date),
            None => return Ok(None),
        },
        "ENVELOPE" => FetchItem::Envelope(Box::new(parse_envelope(lexer)?)),
        "BODY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
            let data = match lexer.next_token()? {
                Token::Literal(bytes) => Some(bytes),
                Token::QuotedString(s) => Some(s.into_bytes()),
                _ => None,
            };
            FetchItem::Body {
                section: section.filter(|s| !s.is_empty()),
                origin,
                data,
            }
        }
        _ => {
            skip_value(lexer)?;
            return Ok(None);
        }
    };
    Ok(Some(item))
}

/// Consumes `open ... close` verbatim if the next byte is `open`.
///
/// Section specifiers can hold spaces and parentheses
/// (`HEADER.FIELDS (From To)`), so they are read as raw bytes.
fn read_enclosed(lexer: &mut Lexer<'_>, open: u8, close: u8) -> Option<String> {
    if lexer.peek() != Some(open) {
        return None;
    }
    lexer.advance();
    let mut inner = Vec::new();
    while let Some(b) = lexer.advance() {
        if b == close {
            break;
        }
        inner.push(b);
    }
    Some(String::from_utf8_lossy(&inner).into_owned())
}

/// Parses an `envelope`: date, subject, six address lists, in-reply-to and
/// message-id.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;
    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;

    let mut lists: [Vec<Address>; 6] = Default::default();
    for list in &mut lists {
        lexer.expect_space()?;
        *list = parse_address_list(lexer)?;
    }
    let [from, sender, reply_to, to, cc, bcc] = lists;

    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses `NIL` or a parenthesized run of addresses.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => return Ok(Vec::new()),
        Token::LParen => {}
        other => {
            return Err(lexer.error(&format!("Expected address list, got {other:?}")));
        }
    }

    let mut addresses = Vec::new();
    loop {
        match lexer.peek() {
            Some(b'(') => addresses.push(parse_address(lexer)?),
            Some(b' ') => {
                lexer.advance();
            }
            Some(b')') => {
                lexer.advance();
                return Ok(addresses);
            }
            _ => return Err(lexer.error("Address list not closed")),
        }
    }
}

/// Parses one `(name adl mailbox host)` address.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;
    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a `body` as found after `BODYSTRUCTURE`.
///
/// Extension data (MD5, disposition, language, location) is skipped.
/// `MESSAGE/RFC822` parts carry the envelope and body of the embedded
/// message.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut bodies = Vec::new();
        while lexer.peek() == Some(b'(') {
            bodies.push(parse_body_structure(lexer)?);
            // some servers separate the parts
            if lexer.peek() == Some(b' ') {
                lexer.advance();
            }
        }
        let subtype = upper_nstring(lexer)?;
        close_body(lexer)?;
        return Ok(BodyStructure::Multipart { bodies, subtype });
    }

    let media_type = upper_nstring(lexer)?;
    lexer.expect_space()?;
    let media_subtype = upper_nstring(lexer)?;
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default();
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    let body = match (media_type.as_str(), media_subtype.as_str()) {
        ("TEXT", _) => BodyStructure::Text {
            subtype: media_subtype,
            params,
            id,
            description,
            encoding,
            size,
            lines: trailing_number(lexer)?.unwrap_or(0),
        },
        ("MESSAGE", "RFC822") if lexer.peek() == Some(b' ') => {
            lexer.advance();
            let envelope = Box::new(parse_envelope(lexer)?);
            lexer.expect_space()?;
            let body = Box::new(parse_body_structure(lexer)?);
            let lines = trailing_number(lexer)?.unwrap_or(0);
            BodyStructure::Message {
                envelope,
                body,
                lines,
            }
        }
        _ => BodyStructure::Basic {
            media_type,
            media_subtype,
            params,
            id,
            description,
            encoding,
            size,
        },
    };
    close_body(lexer)?;
    Ok(body)
}

fn upper_nstring(lexer: &mut Lexer<'_>) -> Result<String> {
    Ok(lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase())
}

fn trailing_number(lexer: &mut Lexer<'_>) -> Result<Option<u32>> {
    if lexer.peek() != Some(b' ') {
        return Ok(None);
    }
    lexer.advance();
    lexer.read_number().map(Some)
}

/// `NIL` or `(key value ...)`.
fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    if lexer.next_token()? != Token::LParen {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                return Ok(params);
            }
            Some(b' ') => {
                lexer.advance();
            }
            Some(_) => {
                let key = lexer.read_nstring()?.unwrap_or_default();
                lexer.expect_space()?;
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
            }
            None => return Err(lexer.error("Body parameter list not closed")),
        }
    }
}

/// Consumes any extension data up to and including the `)` closing the
/// current body.
fn close_body(lexer: &mut Lexer<'_>) -> Result<()> {
    skip_until_depth(lexer, 1)
}

/// Steps over one value: an atom, number, string, literal or a
/// parenthesized list.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    match lexer.next_token()? {
        Token::LParen => skip_until_depth(lexer, 1),
        _ => Ok(()),
    }
}

fn skip_until_depth(lexer: &mut Lexer<'_>, mut depth: usize) -> Result<()> {
    while depth > 0 {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Eof | Token::Crlf => return Err(lexer.error("Unbalanced parentheses")),
            _ => {}
        }
    }
    Ok(())
}
