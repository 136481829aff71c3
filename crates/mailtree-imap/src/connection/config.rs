//! Where and how to reach the server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether the TCP stream is wrapped in TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Cleartext. Meant for loopback servers and tests.
    None,
    /// TLS handshake before the greeting.
    #[default]
    Implicit,
}

impl Security {
    /// 143 for cleartext, 993 for TLS.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        if matches!(self, Self::None) { 143 } else { 993 }
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const fn default_connect_timeout() -> Duration {
    CONNECT_TIMEOUT
}

/// A TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Host name, also used for TLS server name verification.
    pub host: String,
    /// Port.
    pub port: u16,
    /// TLS or not; TLS when omitted.
    #[serde(default)]
    pub security: Security,
    /// Limit on connecting plus the TLS handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl Config {
    /// `host:993` over TLS.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Starts from the defaults of [`Config::new`].
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builds a [`Config`]. The port follows the security mode unless set.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
}

impl ConfigBuilder {
    /// Defaults for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Chooses TLS or cleartext.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Limits connecting plus the handshake.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let Self {
            host,
            port,
            security,
            connect_timeout,
        } = self;
        Config {
            host,
            port: port.unwrap_or(security.default_port()),
            security,
            connect_timeout,
        }
    }
}

/// Source of the byte stream for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Transport {
    /// TCP, with or without TLS.
    Tcp(Config),
    /// A child process talking IMAP over its stdin and stdout.
    Process {
        /// Path or name of the executable.
        program: String,
        /// Its arguments.
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Transport {
    /// `host:port` or `process <program>`, for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Tcp(Config { host, port, .. }) => format!("{host}:{port}"),
            Self::Process { program, .. } => format!("process {program}"),
        }
    }
}
