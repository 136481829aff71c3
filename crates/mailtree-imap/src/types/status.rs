//! Response status keywords.

/// Status keyword of a tagged completion or untagged status response.
///
/// Tagged completions only ever carry `Ok`, `No` or `Bad`; `PreAuth` and `Bye`
/// appear in untagged form only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Matches a status keyword, ignoring ASCII case.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Returns true if the keyword may terminate a tagged command.
    #[must_use]
    pub const fn is_tagged_completion(self) -> bool {
        matches!(self, Self::Ok | Self::No | Self::Bad)
    }

    /// Returns the keyword as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_case() {
        assert_eq!(Status::parse("oK"), Some(Status::Ok));
        assert_eq!(Status::parse("BaD"), Some(Status::Bad));
        assert_eq!(Status::parse("no"), Some(Status::No));
        assert_eq!(Status::parse("MAYBE"), None);
    }

    #[test]
    fn tagged_completion_keywords() {
        assert!(Status::Ok.is_tagged_completion());
        assert!(Status::No.is_tagged_completion());
        assert!(Status::Bad.is_tagged_completion());
        assert!(!Status::Bye.is_tagged_completion());
        assert!(!Status::PreAuth.is_tagged_completion());
    }

    #[test]
    fn is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bye.is_ok());
    }
}
