//! Response codes carried in the bracket of a status response.

/// How many bracket-interior tokens a response code collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeArity {
    /// No arguments.
    Empty,
    /// Exactly one (numeric) argument.
    Single,
    /// Every token after the keyword.
    List,
}

/// Response code keyword (`[ALERT]`, `[UIDNEXT 5]`, ...).
///
/// Arguments are kept separately as an ordered list of strings so that every
/// keyword round-trips the same way; see [`ResponseCode::arity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Human-readable alert that must be shown to the user.
    Alert,
    /// Capability list piggybacked on a status response.
    Capability,
    /// Server failed to parse a message header.
    Parse,
    /// Flags that can be changed permanently.
    PermanentFlags,
    /// Mailbox selected read-only.
    ReadOnly,
    /// Mailbox selected read-write.
    ReadWrite,
    /// Target mailbox does not exist but could be created.
    TryCreate,
    /// Predicted next UID.
    UidNext,
    /// Mailbox UID validity epoch.
    UidValidity,
    /// Sequence number of the first unseen message.
    Unseen,
    /// No code, or a keyword this crate does not interpret.
    None,
}

impl ResponseCode {
    /// Matches a bracket keyword, ignoring ASCII case.
    ///
    /// Unknown keywords map to [`ResponseCode::None`].
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "CAPABILITY" => Self::Capability,
            "PARSE" => Self::Parse,
            "PERMANENTFLAGS" => Self::PermanentFlags,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "UIDNEXT" => Self::UidNext,
            "UIDVALIDITY" => Self::UidValidity,
            "UNSEEN" => Self::Unseen,
            _ => Self::None,
        }
    }

    /// Returns how many arguments this code collects.
    #[must_use]
    pub const fn arity(self) -> CodeArity {
        match self {
            Self::Capability | Self::PermanentFlags => CodeArity::List,
            Self::UidNext | Self::UidValidity | Self::Unseen => CodeArity::Single,
            Self::Alert
            | Self::Parse
            | Self::ReadOnly
            | Self::ReadWrite
            | Self::TryCreate
            | Self::None => CodeArity::Empty,
        }
    }

    /// Returns the canonical keyword, or `None` for [`ResponseCode::None`].
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str> {
        Some(match self {
            Self::Alert => "ALERT",
            Self::Capability => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
            Self::None => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(ResponseCode::from_keyword("ALeRT"), ResponseCode::Alert);
        assert_eq!(ResponseCode::from_keyword("read-write"), ResponseCode::ReadWrite);
        assert_eq!(ResponseCode::from_keyword("uidNext"), ResponseCode::UidNext);
        assert_eq!(ResponseCode::from_keyword("COPYUID"), ResponseCode::None);
    }

    #[test]
    fn arity_per_keyword() {
        assert_eq!(ResponseCode::Capability.arity(), CodeArity::List);
        assert_eq!(ResponseCode::PermanentFlags.arity(), CodeArity::List);
        assert_eq!(ResponseCode::UidValidity.arity(), CodeArity::Single);
        assert_eq!(ResponseCode::TryCreate.arity(), CodeArity::Empty);
    }

    #[test]
    fn keyword_round_trip() {
        for code in [
            ResponseCode::Alert,
            ResponseCode::Capability,
            ResponseCode::Parse,
            ResponseCode::PermanentFlags,
            ResponseCode::ReadOnly,
            ResponseCode::ReadWrite,
            ResponseCode::TryCreate,
            ResponseCode::UidNext,
            ResponseCode::UidValidity,
            ResponseCode::Unseen,
        ] {
            let keyword = code.keyword().unwrap_or_default();
            assert_eq!(ResponseCode::from_keyword(keyword), code);
        }
        assert_eq!(ResponseCode::None.keyword(), None);
    }
}
