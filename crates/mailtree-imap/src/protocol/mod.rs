//! Sans-I/O connection state machine.
//!
//! [`Connection`] owns everything about one server connection except the
//! socket: tag generation, command serialization, response framing and
//! parsing, and the connection-state machine. The I/O layer feeds received
//! bytes to [`Connection::handle_input`] and writes whatever
//! [`Connection::poll_transmit`] returns; collaborators drain
//! [`Connection::poll_event`].
//!
//! ```
//! use mailtree_imap::command::Command;
//! use mailtree_imap::protocol::{Connection, ConnectionState};
//!
//! let mut conn = Connection::new();
//! conn.handle_connected();
//! conn.handle_input(b"* OK ready\r\n");
//!
//! let tag = conn.send(&Command::Login {
//!     username: "joe".into(),
//!     password: "secret".into(),
//! })
//! .unwrap();
//! assert!(conn.poll_transmit().is_some());
//!
//! conn.handle_input(format!("{tag} OK logged in\r\n").as_bytes());
//! assert_eq!(conn.state(), ConnectionState::Authenticated);
//! ```

mod event;
mod framer;
mod state;
mod transmit;

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace, warn};

pub use event::ConnectionEvent;
pub use framer::{Frame, ResponseFramer};
pub use state::{AccessMode, ConnectionState};
pub use transmit::Transmit;

use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, TaggedResponse, UntaggedResponse};
use crate::types::{Mailbox, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// What the connection must remember about a command until it completes.
#[derive(Debug)]
enum InFlight {
    Login,
    Select { mailbox: Mailbox, mode: AccessMode },
    Other,
}

impl InFlight {
    fn for_command(cmd: &Command) -> Self {
        match cmd {
            Command::Login { .. } => Self::Login,
            Command::Select { mailbox } => Self::Select {
                mailbox: mailbox.clone(),
                mode: AccessMode::ReadWrite,
            },
            Command::Examine { mailbox } => Self::Select {
                mailbox: mailbox.clone(),
                mode: AccessMode::ReadOnly,
            },
            _ => Self::Other,
        }
    }
}

/// Part of a serialized command.
#[derive(Debug)]
struct Chunk {
    tag: Tag,
    data: Vec<u8>,
    log: String,
    awaits_continuation: bool,
}

/// One server connection, without the I/O.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    access: Option<AccessMode>,
    selected: Option<Mailbox>,
    tags: TagGenerator,
    capabilities: Vec<String>,
    framer: ResponseFramer,
    greeted: bool,
    chunks: VecDeque<Chunk>,
    waiting_on: Option<Tag>,
    in_flight: HashMap<Tag, InFlight>,
    outbound: VecDeque<Transmit>,
    events: VecDeque<ConnectionEvent>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Creates a disconnected connection.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tag_generator(TagGenerator::default())
    }

    /// Creates a disconnected connection using the given tag generator.
    #[must_use]
    pub fn with_tag_generator(tags: TagGenerator) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            access: None,
            selected: None,
            tags,
            capabilities: Vec::new(),
            framer: ResponseFramer::default(),
            greeted: false,
            chunks: VecDeque::new(),
            waiting_on: None,
            in_flight: HashMap::new(),
            outbound: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Access mode of the selected mailbox.
    #[must_use]
    pub const fn access_mode(&self) -> Option<AccessMode> {
        self.access
    }

    /// The selected mailbox, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&Mailbox> {
        self.selected.as_ref()
    }

    /// Last capability list the server reported.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks for a capability, ignoring ASCII case.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true once the server greeting has been processed.
    #[must_use]
    pub const fn is_greeted(&self) -> bool {
        self.greeted
    }

    /// Number of commands awaiting their tagged completion.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns true if `tag` belongs to a command that has not completed.
    #[must_use]
    pub fn is_in_flight(&self, tag: &Tag) -> bool {
        self.in_flight.contains_key(tag)
    }

    /// The transport is being established.
    pub fn handle_connecting(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// The transport is up; the greeting is expected next.
    pub fn handle_connected(&mut self) {
        self.set_state(ConnectionState::Connected);
    }

    /// The transport closed.
    pub fn handle_disconnected(&mut self, reason: impl Into<String>) {
        self.teardown(ConnectionState::Disconnected, reason.into());
    }

    /// The transport failed.
    pub fn handle_failed(&mut self, reason: impl Into<String>) {
        self.teardown(ConnectionState::Failed, reason.into());
    }

    fn teardown(&mut self, to: ConnectionState, reason: String) {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return;
        }
        self.chunks.clear();
        self.waiting_on = None;
        self.in_flight.clear();
        self.selected = None;
        self.access = None;
        self.set_state(to);
        self.events
            .push_back(ConnectionEvent::Disconnected { reason });
    }

    /// Queues a command and returns its tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the connection cannot carry commands.
    pub fn send(&mut self, cmd: &Command) -> Result<Tag> {
        if !self.state.is_usable() {
            return Err(Error::InvalidState(format!(
                "cannot send {} while {:?}",
                cmd.name(),
                self.state
            )));
        }

        let tag = self.tags.next_tag();
        let chunks = cmd.serialize(&tag);
        let last = chunks.len().saturating_sub(1);
        let redact = matches!(cmd, Command::Login { .. });

        for (i, data) in chunks.into_iter().enumerate() {
            let log = match (redact, i) {
                (true, 0) => format!("{tag} LOGIN [redacted]"),
                (true, _) => "[redacted]".to_string(),
                (false, _) => String::from_utf8_lossy(&data).trim_end().to_string(),
            };
            self.chunks.push_back(Chunk {
                tag: tag.clone(),
                data,
                log,
                awaits_continuation: i < last,
            });
        }

        debug!(%tag, command = cmd.name(), "queued command");
        self.in_flight.insert(tag.clone(), InFlight::for_command(cmd));
        self.flush();
        Ok(tag)
    }

    /// Moves sendable chunks to the outbound queue, stopping at a literal.
    fn flush(&mut self) {
        while self.waiting_on.is_none() {
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            if chunk.awaits_continuation {
                self.waiting_on = Some(chunk.tag.clone());
            }
            trace!(line = %chunk.log, "C:");
            self.events.push_back(ConnectionEvent::LineSent(chunk.log));
            self.outbound.push_back(Transmit::new(chunk.data));
        }
    }

    /// Returns the next bytes to write.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.outbound.pop_front()
    }

    /// Returns the next event.
    pub fn poll_event(&mut self) -> Option<ConnectionEvent> {
        self.events.pop_front()
    }

    /// Feeds received bytes.
    ///
    /// Malformed responses produce [`ConnectionEvent::ParseError`] and are
    /// skipped; processing continues with the next response.
    pub fn handle_input(&mut self, data: &[u8]) {
        self.framer.push(data);

        while let Some(frame) = self.framer.next_frame() {
            if !self.state.is_usable() {
                break;
            }
            match frame {
                Frame::Malformed(raw) => {
                    warn!(len = raw.len(), "discarding unframeable input");
                    self.events.push_back(ConnectionEvent::ParseError {
                        raw,
                        message: "response exceeds framing limits".to_string(),
                    });
                }
                Frame::Response(raw) => {
                    trace!(line = %String::from_utf8_lossy(&raw).trim_end(), "S:");
                    self.events
                        .push_back(ConnectionEvent::LineReceived(raw.clone()));
                    match ResponseParser::parse(&raw) {
                        Ok(response) => self.process(response),
                        Err(e) => {
                            warn!(error = %e, "parse error");
                            self.events.push_back(ConnectionEvent::ParseError {
                                raw,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    fn process(&mut self, response: Response) {
        let mut bye = None;
        match &response {
            Response::Continuation { .. } => {
                if self.waiting_on.take().is_some() {
                    self.flush();
                    return;
                }
            }
            Response::Tagged(tagged) => self.complete(tagged),
            Response::Untagged(untagged) => bye = self.observe(untagged),
        }
        self.events.push_back(ConnectionEvent::Response(response));
        if let Some(reason) = bye {
            self.handle_disconnected(reason);
        }
    }

    fn complete(&mut self, tagged: &TaggedResponse) {
        if self.waiting_on.as_ref() == Some(&tagged.tag) {
            // literal refused; the rest of that command is never sent
            self.waiting_on = None;
            self.chunks.retain(|c| c.tag != tagged.tag);
            self.flush();
        }

        if tagged.code == ResponseCode::Capability && tagged.status == Status::Ok {
            self.capabilities.clone_from(&tagged.args);
        }

        let Some(in_flight) = self.in_flight.remove(&tagged.tag) else {
            warn!(tag = %tagged.tag, "tagged response for unknown command");
            return;
        };

        match (in_flight, tagged.status) {
            (InFlight::Login, Status::Ok) => self.set_state(ConnectionState::Authenticated),
            (InFlight::Select { mailbox, mode }, Status::Ok) => {
                self.access = Some(match tagged.code {
                    ResponseCode::ReadOnly => AccessMode::ReadOnly,
                    ResponseCode::ReadWrite => AccessMode::ReadWrite,
                    _ => mode,
                });
                self.selected = Some(mailbox);
                self.set_state(ConnectionState::Selected);
            }
            (InFlight::Select { .. }, _) if self.state == ConnectionState::Selected => {
                // a failed SELECT leaves no mailbox selected
                self.selected = None;
                self.access = None;
                self.set_state(ConnectionState::Authenticated);
            }
            _ => {}
        }
    }

    /// Updates connection-level state from untagged data; returns a BYE reason.
    fn observe(&mut self, untagged: &UntaggedResponse) -> Option<String> {
        match untagged {
            UntaggedResponse::Capability(caps) => self.capabilities.clone_from(caps),
            UntaggedResponse::State(state) => {
                if state.code == ResponseCode::Capability {
                    self.capabilities.clone_from(&state.args);
                }
                if !self.greeted {
                    self.greeted = true;
                    if state.status == Status::PreAuth {
                        self.set_state(ConnectionState::Authenticated);
                    }
                }
                if state.status == Status::Bye {
                    return Some(state.text.clone());
                }
            }
            _ => {}
        }
        None
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(?from, ?to, "connection state changed");
        self.state = to;
        self.events
            .push_back(ConnectionEvent::StateChanged { from, to });
    }
}
