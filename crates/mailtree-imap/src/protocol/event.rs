//! Observable connection events.

use crate::parser::Response;

use super::ConnectionState;

/// Something a collaborator may want to observe about a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A command chunk was handed to the transport (credentials redacted).
    LineSent(String),
    /// A complete response arrived.
    LineReceived(Vec<u8>),
    /// A parsed response.
    Response(Response),
    /// Bytes that did not parse; the connection keeps going.
    ParseError {
        /// The offending bytes.
        raw: Vec<u8>,
        /// Parser diagnostic.
        message: String,
    },
    /// The connection state changed.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },
    /// The server said BYE or the transport went away.
    Disconnected {
        /// Reason given by the server or the transport.
        reason: String,
    },
}
