//! Engine errors.

use thiserror::Error;

use crate::credentials::CredentialError;

/// Errors raised by engine plumbing: configuration, persistence, credentials
/// and the async driver.
///
/// Failures of individual tasks are not reported through this type; they are
/// [`TaskError`](crate::TaskError) values attached to the task's terminal
/// state.
#[derive(Debug, Error)]
pub enum Error {
    /// From the wire layer.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailtree_imap::Error),

    /// Config or cache file is not valid JSON for its type.
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A setting is missing or out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The credential store failed.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// The engine loop has stopped.
    #[error("Engine is not running")]
    EngineStopped,
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
