//! Stable identities for host heap objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable key derived from a host object's identity, not its content.
///
/// Identities are allocated by a [`HostRealm`](crate::HostRealm) and are never
/// reused within that realm, so a finalized object's identity cannot be
/// confused with a later allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostIdentity(u64);

impl HostIdentity {
    /// Builds an identity from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        HostIdentity(raw)
    }

    /// Returns the raw value of this identity.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}
