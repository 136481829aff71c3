//! Lexer tokens.

/// Token produced by the [`Lexer`](super::Lexer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including flag names such as `\Seen`.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    QuotedString(String),
    /// Literal payload announced by `{n}`.
    Literal(Vec<u8>),
    /// Unsigned number.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, any case.
    Nil,
    /// Line terminator.
    Crlf,
    /// End of input.
    Eof,
}
