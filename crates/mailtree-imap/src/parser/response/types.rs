//! Values produced by the response parser.

use serde::{Deserialize, Serialize};

use crate::types::{
    Flags, ListResponse, Mailbox, ResponseCode, SeqNum, Status, Tag, Uid, UidValidity,
};

/// `tag OK|NO|BAD [code args] text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// The command this completes.
    pub tag: Tag,
    /// `OK`, `NO` or `BAD`.
    pub status: Status,
    /// [`ResponseCode::None`] when the line had no code or an unknown one.
    pub code: ResponseCode,
    /// Code arguments in the order the server sent them.
    pub args: Vec<String>,
    /// Free text after the code.
    pub text: String,
}

impl TaggedResponse {
    /// The first code argument, if it is a number.
    #[must_use]
    pub fn numeric_arg(&self) -> Option<u32> {
        leading_number(&self.args)
    }
}

/// An untagged condition: `* OK`, `* NO`, `* BAD`, `* PREAUTH` or `* BYE`.
///
/// Carries the same code fields as [`TaggedResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateResponse {
    /// The condition keyword.
    pub status: Status,
    /// Bracketed code, [`ResponseCode::None`] if absent.
    pub code: ResponseCode,
    /// Code arguments.
    pub args: Vec<String>,
    /// Free text.
    pub text: String,
}

impl StateResponse {
    /// The first code argument, if it is a number.
    #[must_use]
    pub fn numeric_arg(&self) -> Option<u32> {
        leading_number(&self.args)
    }

    fn number_for(&self, code: &ResponseCode) -> Option<u32> {
        if &self.code == code {
            self.numeric_arg()
        } else {
            None
        }
    }

    /// Value of an `[UIDVALIDITY n]` code.
    #[must_use]
    pub fn uid_validity(&self) -> Option<UidValidity> {
        self.number_for(&ResponseCode::UidValidity)
            .and_then(UidValidity::new)
    }

    /// Value of an `[UIDNEXT n]` code.
    #[must_use]
    pub fn uid_next(&self) -> Option<Uid> {
        self.number_for(&ResponseCode::UidNext).and_then(Uid::new)
    }
}

fn leading_number(args: &[String]) -> Option<u32> {
    args.first()?.parse().ok()
}

/// One data item of a `* n FETCH (...)` response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchItem {
    /// `FLAGS`
    Flags(Flags),
    /// `INTERNALDATE`, unparsed.
    InternalDate(String),
    /// `RFC822.SIZE`
    Rfc822Size(u32),
    /// `ENVELOPE`
    Envelope(Box<Envelope>),
    /// `UID`
    Uid(Uid),
    /// `BODY[section]<origin>` and the `RFC822*` aliases.
    Body {
        /// Bracket contents; `None` for the whole message.
        section: Option<String>,
        /// Partial fetch offset.
        origin: Option<u32>,
        /// `None` when the server answered NIL.
        data: Option<Vec<u8>>,
    },
    /// `BODYSTRUCTURE` or `BODY` without a section.
    BodyStructure(BodyStructure),
}

/// The header summary a server computes for `ENVELOPE`.
///
/// Fields the message lacks are `None` or empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// `Date:`, unparsed.
    pub date: Option<String>,
    /// `Subject:`, possibly still MIME-encoded.
    pub subject: Option<String>,
    /// `From:`
    pub from: Vec<Address>,
    /// `Sender:`
    pub sender: Vec<Address>,
    /// `Reply-To:`
    pub reply_to: Vec<Address>,
    /// `To:`
    pub to: Vec<Address>,
    /// `Cc:`
    pub cc: Vec<Address>,
    /// `Bcc:`
    pub bcc: Vec<Address>,
    /// `In-Reply-To:`
    pub in_reply_to: Option<String>,
    /// `Message-ID:`
    pub message_id: Option<String>,
}

/// One envelope address in its four-part wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Obsolete source route.
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, when both halves are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        let local = self.mailbox.as_deref()?;
        let domain = self.host.as_deref()?;
        Some(format!("{local}@{domain}"))
    }
}

/// Parsed `BODYSTRUCTURE`, without extension data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyStructure {
    /// Any single part that is neither text nor an embedded message.
    Basic {
        /// `APPLICATION`, `IMAGE`, ...
        media_type: String,
        /// Subtype as sent.
        media_subtype: String,
        /// Name/value pairs such as `charset`.
        params: Vec<(String, String)>,
        /// `Content-ID`
        id: Option<String>,
        /// `Content-Description`
        description: Option<String>,
        /// `Content-Transfer-Encoding`
        encoding: String,
        /// Octets.
        size: u32,
    },
    /// `MESSAGE/RFC822` with the embedded message's own structure.
    Message {
        /// Envelope of the embedded message.
        envelope: Box<Envelope>,
        /// Its structure.
        body: Box<Self>,
        /// Line count of the encapsulated text.
        lines: u32,
    },
    /// `TEXT/subtype`.
    Text {
        /// `PLAIN`, `HTML`, ...
        subtype: String,
        /// Name/value pairs.
        params: Vec<(String, String)>,
        /// `Content-ID`
        id: Option<String>,
        /// `Content-Description`
        description: Option<String>,
        /// `Content-Transfer-Encoding`
        encoding: String,
        /// Octets.
        size: u32,
        /// Lines.
        lines: u32,
    },
    /// `MULTIPART/subtype`.
    Multipart {
        /// Children in order.
        bodies: Vec<Self>,
        /// `MIXED`, `ALTERNATIVE`, ...
        subtype: String,
    },
}

/// One node of a [`BodyStructure`] addressed by section number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// `1`, `2.1`, ...
    pub part_id: String,
    /// Lowercase `type/subtype`.
    pub mime_type: String,
    /// Octets; zero for containers.
    pub size: u32,
}

impl BodyStructure {
    /// Lowercase `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        let (kind, sub) = match self {
            Self::Basic {
                media_type,
                media_subtype,
                ..
            } => (media_type.as_str(), media_subtype.as_str()),
            Self::Message { .. } => ("message", "rfc822"),
            Self::Text { subtype, .. } => ("text", subtype.as_str()),
            Self::Multipart { subtype, .. } => ("multipart", subtype.as_str()),
        };
        format!("{kind}/{sub}").to_ascii_lowercase()
    }

    const fn octets(&self) -> u32 {
        match self {
            Self::Basic { size, .. } | Self::Text { size, .. } => *size,
            Self::Message { .. } | Self::Multipart { .. } => 0,
        }
    }

    fn children(&self) -> &[Self] {
        match self {
            Self::Multipart { bodies, .. } => bodies.as_slice(),
            _ => &[],
        }
    }

    /// Every part with its section number, depth first.
    ///
    /// The top-level multipart has no number of its own; a single-part
    /// message is part `1`.
    #[must_use]
    pub fn parts(&self) -> Vec<BodyPart> {
        let mut out = Vec::new();
        if matches!(self, Self::Multipart { .. }) {
            Self::number_children(self.children(), "", &mut out);
        } else {
            self.push_parts("1".to_owned(), &mut out);
        }
        out
    }

    fn number_children(children: &[Self], prefix: &str, out: &mut Vec<BodyPart>) {
        for (n, child) in (1..).zip(children) {
            child.push_parts(format!("{prefix}{n}"), out);
        }
    }

    fn push_parts(&self, part_id: String, out: &mut Vec<BodyPart>) {
        let prefix = format!("{part_id}.");
        out.push(BodyPart {
            part_id,
            mime_type: self.mime_type(),
            size: self.octets(),
        });
        Self::number_children(self.children(), &prefix, out);
    }
}

/// A counter from `* STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// `MESSAGES`
    Messages(u32),
    /// `RECENT`
    Recent(u32),
    /// `UIDNEXT`
    UidNext(Uid),
    /// `UIDVALIDITY`
    UidValidity(UidValidity),
    /// `UNSEEN`
    Unseen(u32),
}

/// Anything the server sends with a `*` prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// `OK`, `NO`, `BAD`, `PREAUTH` or `BYE`.
    State(StateResponse),
    /// `* CAPABILITY ...`
    Capability(Vec<String>),
    /// `* LIST ...`
    List(ListResponse),
    /// The mailbox's applicable flags.
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Message the data belongs to.
        seq: SeqNum,
        /// Items in wire order.
        items: Vec<FetchItem>,
    },
    /// Matching numbers, UIDs or sequence numbers depending on the command.
    Search(Vec<u32>),
    /// `* STATUS mailbox (...)`
    Status {
        /// The mailbox asked about.
        mailbox: Mailbox,
        /// Counters the server knew.
        items: Vec<StatusItem>,
    },
}
