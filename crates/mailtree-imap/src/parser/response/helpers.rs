//! Pieces of response grammar shared by several response kinds.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    CodeArity, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, Uid,
    UidValidity,
};

use super::types::StatusItem;

/// `resp-text` split into its bracketed code and the human-readable rest.
pub struct RespText {
    pub code: ResponseCode,
    pub args: Vec<String>,
    pub text: String,
}

/// Reads `[CODE args] text` through the end of the line.
///
/// Arguments are whitespace separated with list parentheses removed. An
/// unknown keyword gives [`ResponseCode::None`] and keeps the bracket in the
/// text so nothing the server said is lost.
pub fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<RespText> {
    if lexer.peek() != Some(b'[') {
        let text = read_text_until_crlf(lexer);
        return Ok(RespText {
            code: ResponseCode::None,
            args: Vec::new(),
            text,
        });
    }

    let rest = lexer.remaining();
    let line = &rest[..find_crlf(rest).unwrap_or(rest.len())];
    let Some(close) = line.iter().position(|&b| b == b']') else {
        return Err(lexer.error("Unterminated response code"));
    };
    let interior = String::from_utf8_lossy(&line[1..close]).into_owned();
    lexer.skip(close + 1);
    if lexer.peek() == Some(b' ') {
        lexer.skip(1);
    }
    let tail = read_text_until_crlf(lexer);

    let mut words = interior.split_ascii_whitespace();
    let code = ResponseCode::from_keyword(words.next().unwrap_or_default());
    let args: Vec<String> = match code.arity() {
        CodeArity::Empty => Vec::new(),
        CodeArity::Single => words.take(1).filter_map(unparen).collect(),
        CodeArity::List => words.filter_map(unparen).collect(),
    };

    let text = match (code == ResponseCode::None, tail.is_empty()) {
        (false, _) => tail,
        (true, true) => format!("[{interior}]"),
        (true, false) => format!("[{interior}] {tail}"),
    };
    Ok(RespText { code, args, text })
}

fn unparen(word: &str) -> Option<String> {
    let word = word.trim_start_matches('(').trim_end_matches(')');
    if word.is_empty() {
        None
    } else {
        Some(word.to_owned())
    }
}

/// Calls `each` for every atom of a parenthesized list such as `(\Seen foo)`.
fn for_each_listed_atom<'a>(
    lexer: &mut Lexer<'a>,
    what: &str,
    mut each: impl FnMut(&'a str),
) -> Result<()> {
    lexer.expect(Token::LParen)?;
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(()),
            Token::Space => {}
            Token::Atom(atom) => each(atom),
            other => return Err(lexer.error(&format!("Unexpected {other:?} in {what}"))),
        }
    }
}

/// Collects the space-prefixed tokens that follow a keyword until the line ends.
fn trailing_tokens<'a>(lexer: &mut Lexer<'a>) -> Result<Vec<Token<'a>>> {
    let mut tokens = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.skip(1);
        tokens.push(lexer.next_token()?);
    }
    Ok(tokens)
}

/// `CAPABILITY` data, names kept as the server spelled them.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    Ok(trailing_tokens(lexer)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Atom(name) => Some(name.to_owned()),
            Token::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// `(flag ...)`
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    let mut flags = Flags::new();
    for_each_listed_atom(lexer, "flag list", |atom| flags.insert(Flag::parse(atom)))?;
    Ok(flags)
}

/// `LIST (attributes) delimiter name`
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    let mut attributes = Vec::new();
    for_each_listed_atom(lexer, "LIST attributes", |atom| {
        attributes.push(MailboxAttribute::parse(atom));
    })?;
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(d) => d.chars().next(),
        other => return Err(lexer.error(&format!("Expected delimiter, got {other:?}"))),
    };
    lexer.expect_space()?;
    let mailbox = Mailbox::new(lexer.read_astring()?);

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox,
    })
}

/// `SEARCH n n n`
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    Ok(trailing_tokens(lexer)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Number(n) => Some(n),
            _ => None,
        })
        .collect())
}

/// `STATUS mailbox (NAME value ...)`
///
/// Unknown names and zero UID values are dropped.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let mailbox = Mailbox::new(lexer.read_astring()?);
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Eof | Token::Crlf => return Err(lexer.error("Unterminated STATUS list")),
            Token::Atom(name) => name,
            _ => continue,
        };
        lexer.expect_space()?;
        let n = lexer.read_number()?;
        let item = if name.eq_ignore_ascii_case("MESSAGES") {
            Some(StatusItem::Messages(n))
        } else if name.eq_ignore_ascii_case("RECENT") {
            Some(StatusItem::Recent(n))
        } else if name.eq_ignore_ascii_case("UNSEEN") {
            Some(StatusItem::Unseen(n))
        } else if name.eq_ignore_ascii_case("UIDNEXT") {
            Uid::new(n).map(StatusItem::UidNext)
        } else if name.eq_ignore_ascii_case("UIDVALIDITY") {
            UidValidity::new(n).map(StatusItem::UidValidity)
        } else {
            None
        };
        items.extend(item);
    }

    Ok((mailbox, items))
}

/// Offset of the first CRLF in `buf`.
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}

/// Consumes the rest of the line, terminator included, and returns it as text.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let rest = lexer.remaining();
    let end = find_crlf(rest).unwrap_or(rest.len());
    let text = String::from_utf8_lossy(&rest[..end]).into_owned();
    lexer.skip(end + 2);
    text
}
