//! Wire-layer errors.

use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong below the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake or record-layer failure.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The host cannot be used as a TLS server name.
    #[error("Host is not a valid TLS server name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Malformed wire data.
    #[error("Parse error at byte {position}: {message}")]
    Parse {
        /// Offset into the framed response.
        position: usize,
        /// What was expected or found.
        message: String,
    },

    /// Connecting did not finish in time.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// The connection state forbids this operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Well-formed data the protocol does not allow here.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
