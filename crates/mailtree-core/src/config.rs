//! Engine configuration.

use std::path::{Path, PathBuf};

use mailtree_imap::{Config, Transport};
use serde::{Deserialize, Serialize};

use crate::policy::NetworkPolicy;
use crate::{Error, Result};

const fn default_max_connections() -> usize {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_login_attempts() -> u32 {
    3
}

/// Everything the engine needs to reach one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How to reach the server.
    pub transport: Transport,
    /// Login name.
    pub username: String,
    /// Policy in effect at startup.
    #[serde(default)]
    pub policy: NetworkPolicy,
    /// Cache file; `None` keeps the cache in memory only.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Upper bound on simultaneously open connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Fetch envelopes of new arrivals in the background.
    #[serde(default = "default_true")]
    pub prefetch: bool,
    /// LOGIN attempts before authentication is given up.
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
}

impl EngineConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder(transport: Transport, username: impl Into<String>) -> EngineConfigBuilder {
        EngineConfigBuilder::new(transport, username)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("username is required".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        if self.login_attempts == 0 {
            return Err(Error::Config("login_attempts must be at least 1".to_string()));
        }
        match &self.transport {
            Transport::Tcp(config) if config.host.trim().is_empty() => {
                Err(Error::Config("server host is required".to_string()))
            }
            Transport::Tcp(Config { port: 0, .. }) => {
                Err(Error::Config("server port must be 1-65535".to_string()))
            }
            Transport::Process { program, .. } if program.trim().is_empty() => {
                Err(Error::Config("program is required".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(transport: Transport, username: impl Into<String>) -> Self {
        Self {
            config: EngineConfig {
                transport,
                username: username.into(),
                policy: NetworkPolicy::default(),
                cache_path: None,
                max_connections: default_max_connections(),
                prefetch: true,
                login_attempts: default_login_attempts(),
            },
        }
    }

    /// Sets the startup policy.
    #[must_use]
    pub const fn policy(mut self, policy: NetworkPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Persists the cache at `path`.
    #[must_use]
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    /// Sets the connection limit.
    #[must_use]
    pub const fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Enables or disables background envelope prefetch.
    #[must_use]
    pub const fn prefetch(mut self, enabled: bool) -> Self {
        self.config.prefetch = enabled;
        self
    }

    /// Sets the number of LOGIN attempts.
    #[must_use]
    pub const fn login_attempts(mut self, attempts: u32) -> Self {
        self.config.login_attempts = attempts;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a field is invalid.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
