//! Connection state types.

/// Lifecycle of one server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport is being established.
    Connecting,
    /// Transport is up; greeting received or pending.
    Connected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// Transport or protocol failure; the connection cannot be reused.
    Failed,
}

impl ConnectionState {
    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }

    /// Returns `true` if commands may be written.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated | Self::Selected)
    }
}

/// Access mode of the selected mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Opened with EXAMINE or reported `[READ-ONLY]`.
    ReadOnly,
    /// Opened with SELECT and writable.
    ReadWrite,
}
