//! # Notecal Core Library
//!
//! Core engine for syncing the schedule section of per-day markdown notes
//! to Google Calendar through a service account. The CLI binary is a thin
//! layer over this library; editors or other hosts can embed it the same
//! way by implementing [`NoteVault`].
//!
//! ## Architecture
//!
//! - **Parser**: extracts schedule entries and a normalized fingerprint
//!   from the heading-bounded section of a day note
//! - **Change detection**: cheap digest of the fingerprint, gating
//!   re-syncs of unmodified notes
//! - **Auth**: service-account JWT assertion exchange with an in-process
//!   token cache
//! - **Gateway**: typed create/patch/delete/list operations against the
//!   Google Calendar v3 REST API
//! - **Sync engine**: per-day reconciliation of parsed entries against the
//!   persisted key map and the live remote state
//! - **Storage**: TOML settings blob holding configuration and the
//!   key-to-event-id map
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: drives one sync cycle per (note, date)
//! - [`CalendarGateway`]: remote calendar operations
//! - [`TokenBroker`]: bearer-token acquisition and caching
//! - [`Settings`]: durable configuration + sync map

pub mod auth;
pub mod changes;
pub mod error;
pub mod gateway;
pub mod parser;
pub mod storage;
pub mod sync;
pub mod vault;

#[cfg(test)]
pub(crate) mod testkey;

pub use auth::{ServiceAccount, TokenBroker};
pub use changes::{schedule_hash, ChangeTracker};
pub use error::{AuthError, ConfigError, GatewayError, SyncError, VaultError};
pub use gateway::{build_event_body, CalendarGateway, EventBody, EventTime, RemoteEvent};
pub use parser::{make_event_key, normalized_fingerprint, parse_schedule, ScheduleEntry};
pub use storage::Settings;
pub use sync::{SyncEngine, SyncOutcome, SyncPhase};
pub use vault::{FsVault, NoteVault};
