//! Bridge statistics and leak reports.

use serde::{Serialize, Serializer};
use std::time::Duration;

use host_types::HostIdentity;
use persistent_types::ValueKind;

use crate::ContextId;

/// Counters describing one bridge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BridgeStats {
    /// Number of entries
    pub count: usize,
    /// Entries with the root flag set
    pub root_count: usize,
    /// Weak entries
    pub weak_count: usize,
    /// Reverse (handle to identity) mappings
    pub reverse_count: usize,
}

/// A rooted entry older than the scan threshold.
///
/// Warnings are diagnostics, not errors: they never fail an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeakWarning {
    /// Host identity of the entry
    pub identity: HostIdentity,
    /// Kind of the pinned handle
    pub kind: ValueKind,
    /// Time since the entry was created
    #[serde(rename = "age_ms", serialize_with = "serialize_millis")]
    pub age: Duration,
}

/// Result of a leak scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeakReport {
    /// Context scanned
    pub context: ContextId,
    /// Age threshold used by the scan
    #[serde(rename = "threshold_ms", serialize_with = "serialize_millis")]
    pub threshold: Duration,
    /// Offending entries, oldest first
    pub warnings: Vec<LeakWarning>,
}

impl LeakReport {
    /// Creates a report, ordering warnings oldest first.
    pub fn new(context: ContextId, threshold: Duration, mut warnings: Vec<LeakWarning>) -> Self {
        warnings.sort_by(|a, b| b.age.cmp(&a.age).then(a.identity.cmp(&b.identity)));
        LeakReport {
            context,
            threshold,
            warnings,
        }
    }

    /// Returns true when nothing was flagged.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of flagged entries.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Identities of the flagged entries.
    pub fn identities(&self) -> Vec<HostIdentity> {
        self.warnings.iter().map(|w| w.identity).collect()
    }

    /// Age of the oldest flagged entry.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.warnings.first().map(|w| w.age)
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
}
