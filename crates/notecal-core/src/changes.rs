//! Change detection for schedule sections.
//!
//! The digest is a rolling multiplicative hash (djb2 xor variant) of the
//! normalized fingerprint, rendered as 8 hex digits. It is a cheap
//! equality test across edits, not a cryptographic hash. The tracker keeps
//! the last recorded digest per note path so no-op edits (and editor save
//! storms) do not trigger redundant network round trips.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 8-hex-digit digest of a normalized schedule fingerprint.
///
/// `hash = (hash * 33) XOR unit`, wrapping in u32, seed 5381, folded over
/// UTF-16 code units so the digest is stable across hosts that index text
/// by code unit.
pub fn schedule_hash(input: &str) -> String {
    let mut hash: u32 = 5381;
    for unit in input.encode_utf16() {
        hash = hash.wrapping_mul(33) ^ u32::from(unit);
    }
    format!("{hash:08x}")
}

/// Last recorded digest per note path.
///
/// Process-scoped state with an empty init and no teardown. The caller
/// records a digest whenever a sync is *attempted*, even if the sync fails
/// partway, so a failing note cannot re-trigger in a tight loop.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last: HashMap<PathBuf, String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `digest` equals the last recorded digest for `path`.
    pub fn is_unchanged(&self, path: &Path, digest: &str) -> bool {
        self.last.get(path).is_some_and(|last| last == digest)
    }

    /// Record `digest` as the last seen digest for `path`.
    pub fn record(&mut self, path: &Path, digest: String) {
        self.last.insert(path.to_path_buf(), digest);
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_seed() {
        assert_eq!(schedule_hash(""), "00001505");
    }

    #[test]
    fn digest_is_deterministic_and_eight_hex_chars() {
        let a = schedule_hash("09:00 Standup\n14:30 1:1");
        let b = schedule_hash("09:00 Standup\n14:30 1:1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_changes_with_content() {
        assert_ne!(schedule_hash("09:00 Standup"), schedule_hash("09:30 Standup"));
    }

    #[test]
    fn digest_handles_non_ascii() {
        // Non-BMP input exercises surrogate-pair code units.
        assert_eq!(schedule_hash("Caf\u{e9} \u{1f4c5}"), schedule_hash("Caf\u{e9} \u{1f4c5}"));
        assert_ne!(schedule_hash("Caf\u{e9}"), schedule_hash("Cafe"));
    }

    #[test]
    fn tracker_reports_unchanged_only_after_record() {
        let mut tracker = ChangeTracker::new();
        let path = Path::new("Daily/2025-03-01.md");
        let digest = schedule_hash("09:00 Standup");

        assert!(!tracker.is_unchanged(path, &digest));
        tracker.record(path, digest.clone());
        assert!(tracker.is_unchanged(path, &digest));
        assert!(!tracker.is_unchanged(path, "deadbeef"));

        tracker.record(path, "deadbeef".to_string());
        assert!(!tracker.is_unchanged(path, &digest));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn digest_always_eight_hex_chars(input in ".*") {
                let digest = schedule_hash(&input);
                prop_assert_eq!(digest.len(), 8);
                prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
            }
        }
    }
}
