//! Network access policy.

use serde::{Deserialize, Serialize};

/// How much network use the engine is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    /// No connections may be opened; requests are served from the cache or fail.
    Offline,
    /// Connections are allowed, background work is not.
    Expensive,
    /// Everything is allowed.
    #[default]
    Online,
}

impl NetworkPolicy {
    /// Returns true if new connections may be opened.
    #[must_use]
    pub const fn allows_connections(self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Returns true if non-essential work such as prefetch may run.
    #[must_use]
    pub const fn allows_background(self) -> bool {
        matches!(self, Self::Online)
    }
}
