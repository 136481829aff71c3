//! Credential providers.
//!
//! The engine asks a [`CredentialProvider`] for a password whenever a
//! connection needs to log in, and again (with a higher attempt number) when
//! the server rejects the previous one.
//!
//! - [`StaticCredentials`]: a fixed password, for tests and scripted use
//! - [`KeyringCredentials`]: the platform keyring (Secret Service, Keychain,
//!   Credential Manager)

use keyring::Entry;
use tracing::{debug, warn};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailtree";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// One request for a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Login name.
    pub username: String,
    /// 1 for the first try, incremented after each rejection.
    pub attempt: u32,
    /// Server text of the previous rejection, if any.
    pub rejection: Option<String>,
}

/// Source of passwords.
pub trait CredentialProvider: Send {
    /// Returns the password to try, or `None` to give up.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn password(&mut self, request: &CredentialRequest) -> CredentialResult<Option<String>>;
}

/// A fixed password.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    password: String,
}

impl StaticCredentials {
    /// Creates a provider that always answers with `password`.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn password(&mut self, _request: &CredentialRequest) -> CredentialResult<Option<String>> {
        Ok(Some(self.password.clone()))
    }
}

/// Passwords stored in the system keyring.
///
/// A rejected password is not retried: the provider returns `None` on any
/// attempt after the first, so the collaborator that owns the keyring entry
/// can prompt the user and store a new one.
#[derive(Debug, Clone)]
pub struct KeyringCredentials {
    service: String,
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringCredentials {
    /// Creates a provider reading entries of the given keyring service.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Stores a password for `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails.
    pub fn store(&self, username: &str, password: &str) -> CredentialResult<()> {
        let entry = Entry::new(&self.service, username)?;
        entry.set_password(password)?;
        debug!(username, "stored password");
        Ok(())
    }

    /// Deletes the password for `username`; a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails.
    pub fn delete(&self, username: &str) -> CredentialResult<()> {
        let entry = Entry::new(&self.service, username)?;
        match entry.delete_credential() {
            Ok(()) => {
                debug!(username, "deleted password");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete password: {e}");
                Err(e.into())
            }
        }
    }
}

impl CredentialProvider for KeyringCredentials {
    fn password(&mut self, request: &CredentialRequest) -> CredentialResult<Option<String>> {
        if request.attempt > 1 {
            return Ok(None);
        }
        let entry = Entry::new(&self.service, &request.username)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => {
                debug!(username = %request.username, "no password in keyring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
