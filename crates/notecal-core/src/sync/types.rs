//! Core types for the sync cycle.

use std::fmt;

use serde::Serialize;

/// Phase of one sync cycle, for status reporting and logs. `Error` is
/// terminal from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Parsing,
    Authenticating,
    Indexing,
    Syncing,
    Done,
    Error,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Parsing => "parsing",
            SyncPhase::Authenticating => "authenticating",
            SyncPhase::Indexing => "indexing",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Done => "done",
            SyncPhase::Error => "error",
        };
        f.write_str(text)
    }
}

/// Counts reported by a sync cycle (or a bulk run of cycles). Partial
/// success is expressed here, not as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Entries created or patched on the remote calendar.
    pub entries_synced: usize,
    /// Stale remote events deleted.
    pub events_removed: usize,
    /// Per-entry or per-deletion operations that failed.
    pub failures: usize,
}

impl SyncOutcome {
    /// Fold another cycle's counts into this one.
    pub fn absorb(&mut self, other: &SyncOutcome) {
        self.entries_synced += other.entries_synced;
        self.events_removed += other.events_removed;
        self.failures += other.failures;
    }
}
