//! The sync engine: drives one reconciliation cycle per (note, date).
//!
//! Within a cycle everything is strictly sequential -- entries are
//! processed in source order and bulk runs handle one day at a time --
//! so API call ordering stays predictable and the one-shot re-auth retry
//! in the gateway never races itself.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;

use crate::changes::{schedule_hash, ChangeTracker};
use crate::error::{GatewayError, SyncError, VaultError};
use crate::gateway::{build_event_body, remote_key_index, CalendarGateway};
use crate::parser::{make_event_key, normalized_fingerprint, parse_schedule, ScheduleEntry};
use crate::storage::Settings;
use crate::sync::types::{SyncOutcome, SyncPhase};
use crate::vault::NoteVault;

fn log_phase(path: &Path, phase: SyncPhase) {
    log::debug!("{}: {phase}", path.display());
}

/// Reconciles day notes against the remote calendar.
///
/// Owns the settings blob (including the persisted key map), the change
/// tracker and the gateway. The map is only ever mutated inside a cycle's
/// sequential flow, so no locking is needed.
pub struct SyncEngine<V: NoteVault> {
    vault: V,
    gateway: CalendarGateway,
    settings: Settings,
    tracker: ChangeTracker,
}

impl<V: NoteVault> SyncEngine<V> {
    pub fn new(vault: V, settings: Settings) -> Self {
        let gateway = CalendarGateway::new(settings.service_account());
        Self {
            vault,
            gateway,
            settings,
            tracker: ChangeTracker::new(),
        }
    }

    /// Engine with an explicit gateway (tests point it at a mock server).
    pub fn with_gateway(vault: V, settings: Settings, gateway: CalendarGateway) -> Self {
        Self {
            vault,
            gateway,
            settings,
            tracker: ChangeTracker::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one sync cycle for `path` on `date`.
    ///
    /// Authentication failure aborts before any remote mutation. Per-entry
    /// and per-deletion failures are counted in the outcome instead of
    /// aborting; the key map is persisted at the end of the cycle either
    /// way.
    pub async fn sync_note(&mut self, path: &Path, date: NaiveDate) -> Result<SyncOutcome, SyncError> {
        log_phase(path, SyncPhase::Parsing);
        let text = self.vault.read_note(path)?;

        // Record the digest for every attempted sync, success or not, so
        // a failing note cannot re-trigger the watch loop back to back.
        let digest = schedule_hash(&normalized_fingerprint(&text, &self.settings.schedule_heading));
        self.tracker.record(path, digest);

        let entries = parse_schedule(&text, &self.settings.schedule_heading);

        log_phase(path, SyncPhase::Authenticating);
        if let Err(err) = self.gateway.ensure_authenticated().await {
            log_phase(path, SyncPhase::Error);
            return Err(SyncError::Auth(err));
        }

        log_phase(path, SyncPhase::Indexing);
        let remote_index = match self.gateway.list_for_date(&self.settings.calendar_id, date).await {
            Ok(events) => remote_key_index(&events),
            Err(GatewayError::Auth(err)) => {
                log_phase(path, SyncPhase::Error);
                return Err(SyncError::Auth(err));
            }
            Err(err) => {
                // Degraded mode: the key map still resolves everything it
                // already knows about.
                log::warn!(
                    "listing remote events for {date} failed, continuing without remote index: {err}"
                );
                HashMap::new()
            }
        };

        log_phase(path, SyncPhase::Syncing);
        let mut outcome = SyncOutcome::default();
        let cycle = self
            .apply_day(path, date, &entries, &remote_index, &mut outcome)
            .await;

        // Persist even when the cycle aborted partway: successful creates
        // and patches are already live on the remote, and losing their ids
        // means duplicate creates next run.
        let persisted = self.settings.save();
        if let Err(err) = persisted {
            log::error!("failed to persist sync map: {err}");
            log_phase(path, SyncPhase::Error);
            cycle?;
            return Err(SyncError::Config(err));
        }

        cycle?;
        log_phase(path, SyncPhase::Done);
        log::info!(
            "synced {} for {date}: {} entries, {} removed, {} failures",
            path.display(),
            outcome.entries_synced,
            outcome.events_removed,
            outcome.failures
        );
        Ok(outcome)
    }

    /// Create/patch current entries, then delete everything this engine
    /// knows about for `date` that no longer appears in the note.
    async fn apply_day(
        &mut self,
        path: &Path,
        date: NaiveDate,
        entries: &[ScheduleEntry],
        remote_index: &HashMap<String, String>,
        outcome: &mut SyncOutcome,
    ) -> Result<(), SyncError> {
        let calendar_id = self.settings.calendar_id.clone();
        let mut current_keys = HashSet::new();

        for entry in entries {
            let key = make_event_key(date, &entry.raw_line);
            current_keys.insert(key.clone());

            let body = build_event_body(
                entry,
                date,
                &self.settings.time_zone,
                path,
                self.settings.default_duration_minutes,
            );

            // The key map wins; the remote marker is advisory and only
            // backfills ids the map has lost.
            let existing = if let Some(id) = self.settings.event_map.get(&key) {
                Some(id.clone())
            } else if let Some(id) = remote_index.get(&key) {
                log::debug!("recovered id for '{key}' from remote marker");
                self.settings.event_map.insert(key.clone(), id.clone());
                Some(id.clone())
            } else {
                None
            };

            let result = match &existing {
                Some(id) => self.gateway.patch(&calendar_id, id, &body).await,
                None => self.gateway.create(&calendar_id, &body).await,
            };

            match result {
                Ok(remote) => {
                    self.settings.event_map.insert(key, remote.id);
                    outcome.entries_synced += 1;
                }
                Err(GatewayError::Auth(err)) => return Err(SyncError::Auth(err)),
                Err(err) => {
                    log::error!("failed to sync '{}' for {date}: {err}", entry.title);
                    outcome.failures += 1;
                }
            }
        }

        // Deletion set: (map keys for the date) union (remote keys for the
        // date), minus the keys still present in the note. Sorted for
        // deterministic call order.
        let prefix = format!("{}::", date.format("%Y-%m-%d"));
        let mut stale: Vec<(String, String)> = self
            .settings
            .event_map
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix) && !current_keys.contains(*key))
            .map(|(key, id)| (key.clone(), id.clone()))
            .collect();
        for (key, id) in remote_index {
            if key.starts_with(&prefix)
                && !current_keys.contains(key)
                && !self.settings.event_map.contains_key(key)
            {
                stale.push((key.clone(), id.clone()));
            }
        }
        stale.sort();

        for (key, event_id) in stale {
            match self.gateway.delete(&calendar_id, &event_id).await {
                Ok(()) => {
                    self.settings.event_map.remove(&key);
                    outcome.events_removed += 1;
                }
                Err(GatewayError::Auth(err)) => return Err(SyncError::Auth(err)),
                Err(err) => {
                    log::error!("failed to delete stale event for '{key}': {err}");
                    outcome.failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Sync today's note, resolved from the configured folder and
    /// filename format. A missing note for today is a no-op, not an
    /// error.
    pub async fn sync_today(&mut self) -> Result<Option<SyncOutcome>, SyncError> {
        let date = self.vault.today();
        let path = self.settings.note_path_for(date);
        match self.sync_note(&path, date).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(SyncError::Vault(VaultError::NotFound(missing))) => {
                log::info!("no note for today at {}", missing.display());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Sync every note in the daily folder whose filename parses with the
    /// configured date format, one day at a time. Unreadable notes are
    /// skipped and counted; auth and persistence failures stop the run.
    pub async fn sync_all(&mut self) -> Result<SyncOutcome, SyncError> {
        let folder = self.settings.daily_folder_path();
        let notes = self.vault.list_notes(&folder)?;

        let mut total = SyncOutcome::default();
        for path in notes {
            let Some(date) = self.settings.date_from_filename(&path) else {
                continue;
            };
            match self.sync_note(&path, date).await {
                Ok(outcome) => total.absorb(&outcome),
                Err(SyncError::Vault(err)) => {
                    log::warn!("skipping {}: {err}", path.display());
                    total.failures += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Record the current digest of every daily note without syncing, so
    /// a following watch loop only reacts to real edits.
    pub fn prime_hashes(&mut self) -> Result<usize, SyncError> {
        let folder = self.settings.daily_folder_path();
        let notes = self.vault.list_notes(&folder)?;

        let mut primed = 0;
        for path in notes {
            if self.settings.date_from_filename(&path).is_none() {
                continue;
            }
            match self.vault.read_note(&path) {
                Ok(text) => {
                    let digest =
                        schedule_hash(&normalized_fingerprint(&text, &self.settings.schedule_heading));
                    self.tracker.record(&path, digest);
                    primed += 1;
                }
                Err(err) => log::debug!("failed to prime digest for {}: {err}", path.display()),
            }
        }
        Ok(primed)
    }

    /// Sync only the daily notes whose schedule digest changed since the
    /// last recorded digest. One pass of the watch loop.
    pub async fn sync_changed(&mut self) -> Result<SyncOutcome, SyncError> {
        let folder = self.settings.daily_folder_path();
        let notes = self.vault.list_notes(&folder)?;

        let mut total = SyncOutcome::default();
        for path in notes {
            let Some(date) = self.settings.date_from_filename(&path) else {
                continue;
            };
            let digest = match self.vault.read_note(&path) {
                Ok(text) => {
                    schedule_hash(&normalized_fingerprint(&text, &self.settings.schedule_heading))
                }
                Err(err) => {
                    log::warn!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            if self.tracker.is_unchanged(&path, &digest) {
                continue;
            }
            match self.sync_note(&path, date).await {
                Ok(outcome) => total.absorb(&outcome),
                Err(SyncError::Vault(err)) => {
                    log::warn!("skipping {}: {err}", path.display());
                    total.failures += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }
}
