//! Transport configuration and byte stream providers.
//!
//! The wire layer itself is sans-I/O (see [`crate::protocol`]); this module
//! only knows how to open a duplex byte stream to a server.

mod config;
mod stream;

pub use config::{Config, ConfigBuilder, Security, Transport};
pub use stream::{ImapStream, ProcessStream, connect, create_tls_connector};
