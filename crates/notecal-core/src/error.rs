//! Core error types for notecal-core.
//!
//! Parse-level problems never surface here: unparseable schedule lines are
//! skipped by the parser and an absent heading yields an empty entry list.
//! Everything that can abort or degrade a sync cycle is modeled below.

use std::path::PathBuf;
use thiserror::Error;

/// Settings blob load/save/access errors.
///
/// A save failure after a sync cycle is the loud one: losing the key map
/// risks duplicate creates on the next run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load the settings file
    #[error("Failed to load settings from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save the settings file
    #[error("Failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Settings directory could not be resolved or created
    #[error("Settings directory unavailable: {0}")]
    DirUnavailable(#[from] std::io::Error),

    /// Unknown settings key
    #[error("Unknown settings key: {0}")]
    UnknownKey(String),

    /// Invalid settings value
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Credential exchange and authorization errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Service account email or private key missing from settings
    #[error("Service account not configured (client email / private key)")]
    NotConfigured,

    /// Private key could not be parsed or the assertion could not be signed
    #[error("Failed to build signed assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),

    /// Token endpoint returned a non-2xx response
    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The calendar API rejected the credential again after one refresh
    #[error("Authorization rejected after token refresh, status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Remote calendar API errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Authentication failed (including 401/403 after the one-shot retry)
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Non-auth, non-2xx API response; not retried automatically
    #[error("Calendar API error with status {status}: {body}")]
    Api { status: u16, body: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Host document-layer errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Note does not exist
    #[error("Note not found: {0}")]
    NotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that terminate a sync cycle.
///
/// Per-entry gateway failures do NOT become a `SyncError`; they are counted
/// in [`crate::sync::SyncOutcome`] and the cycle keeps going.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Authentication failed; the cycle performed no further mutations
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Could not read the note or list the daily folder
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    /// Could not persist the settings blob (sync map at risk)
    #[error("Settings error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for SyncError
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
