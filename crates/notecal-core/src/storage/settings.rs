//! TOML-based settings blob.
//!
//! Holds the sync configuration and, alongside it, the durable key map
//! from schedule-line identity keys to remote event ids. Stored at
//! `~/.config/notecal/settings.toml` (see [`super::data_dir`]); a loaded
//! instance remembers where it came from so the engine can persist the
//! map back to the same file.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::ServiceAccount;
use crate::error::ConfigError;

/// Application settings plus the persisted sync map.
///
/// Field defaults mirror a fresh install: sync `primary`, look for notes
/// under `Daily/` named `YYYY-MM-DD.md`, read items under `## Schedule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Target calendar ('primary' or a calendar email).
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Service-account client email from the JSON key.
    #[serde(default)]
    pub sa_client_email: String,
    /// Service-account private key PEM from the JSON key.
    #[serde(default)]
    pub sa_private_key: String,
    /// Folder containing daily notes.
    #[serde(default = "default_daily_folder")]
    pub daily_folder: String,
    /// chrono format string for daily filenames, without extension.
    #[serde(default = "default_filename_format")]
    pub daily_filename_format: String,
    /// Heading under which schedule items are listed.
    #[serde(default = "default_heading")]
    pub schedule_heading: String,
    /// Duration for events without end times, minutes.
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
    /// IANA time zone attached to timed events.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Whether the watch loop may sync modified notes automatically.
    #[serde(default)]
    pub auto_sync: bool,
    /// Identity key -> remote event id. Mutated only by the sync engine.
    #[serde(default)]
    pub event_map: HashMap<String, String>,

    /// File this instance was loaded from, for saving back.
    #[serde(skip)]
    source: Option<PathBuf>,
}

fn default_calendar_id() -> String {
    "primary".into()
}
fn default_daily_folder() -> String {
    "Daily".into()
}
fn default_filename_format() -> String {
    "%Y-%m-%d".into()
}
fn default_heading() -> String {
    "Schedule".into()
}
fn default_duration() -> u32 {
    60
}
fn default_time_zone() -> String {
    "UTC".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            sa_client_email: String::new(),
            sa_private_key: String::new(),
            daily_folder: default_daily_folder(),
            daily_filename_format: default_filename_format(),
            schedule_heading: default_heading(),
            default_duration_minutes: default_duration(),
            time_zone: default_time_zone(),
            auto_sync: false,
            event_map: HashMap::new(),
            source: None,
        }
    }
}

impl Settings {
    fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(super::data_dir()?.join("settings.toml"))
    }

    /// Load from the default location, or return defaults if the file
    /// does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path, or return defaults bound to that path
    /// if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut settings: Settings =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                settings.source = Some(path.to_path_buf());
                Ok(settings)
            }
            Err(_) => {
                let mut settings = Self::default();
                settings.source = Some(path.to_path_buf());
                Ok(settings)
            }
        }
    }

    /// Persist to the file this instance was loaded from (or the default
    /// location for a fresh instance).
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = match &self.source {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Path the settings will be saved to.
    pub fn save_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.source {
            Some(path) => Ok(path.clone()),
            None => Self::default_path(),
        }
    }

    /// Service-account identity for the credential broker.
    pub fn service_account(&self) -> ServiceAccount {
        ServiceAccount {
            client_email: self.sa_client_email.clone(),
            private_key_pem: self.sa_private_key.clone(),
        }
    }

    /// Folder containing daily notes, as a path.
    pub fn daily_folder_path(&self) -> PathBuf {
        PathBuf::from(self.daily_folder.trim_matches('/'))
    }

    /// Expected note path for `date`: folder + formatted filename + `.md`.
    pub fn note_path_for(&self, date: NaiveDate) -> PathBuf {
        let mut name = format_date(date, &self.daily_filename_format);
        if !name.ends_with(".md") {
            name.push_str(".md");
        }
        self.daily_folder_path().join(name)
    }

    /// Date encoded in a note's filename, if the stem parses strictly
    /// with the configured format.
    pub fn date_from_filename(&self, path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(".md").unwrap_or(name);
        NaiveDate::parse_from_str(stem, &self.daily_filename_format).ok()
    }

    /// Get a settings value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a settings value by key and persist. Returns an error for
    /// unknown keys or values that do not parse as the field's type.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be
    /// parsed, or the settings cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let object = json.as_object_mut().ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = object
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => {
                let parsed = value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("cannot parse '{value}' as bool"),
                })?;
                serde_json::Value::Bool(parsed)
            }
            serde_json::Value::Number(_) => {
                let parsed = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("cannot parse '{value}' as number"),
                })?;
                serde_json::Value::Number(parsed.into())
            }
            serde_json::Value::Object(_) => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "key is not directly settable".to_string(),
                })
            }
            _ => serde_json::Value::String(value.to_string()),
        };
        object.insert(key.to_string(), new_value);

        let source = self.source.clone();
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.source = source;
        self.save()
    }
}

/// Format a date with a user-supplied chrono format string, falling back
/// to ISO on an invalid format instead of panicking.
fn format_date(date: NaiveDate, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_match_fresh_install() {
        let settings = Settings::default();
        assert_eq!(settings.calendar_id, "primary");
        assert_eq!(settings.daily_folder, "Daily");
        assert_eq!(settings.daily_filename_format, "%Y-%m-%d");
        assert_eq!(settings.schedule_heading, "Schedule");
        assert_eq!(settings.default_duration_minutes, 60);
        assert_eq!(settings.time_zone, "UTC");
        assert!(!settings.auto_sync);
        assert!(settings.event_map.is_empty());
    }

    #[test]
    fn roundtrips_through_toml_with_event_map() {
        let mut settings = Settings::default();
        settings
            .event_map
            .insert("2025-03-01::09:00 Standup".into(), "evt-1".into());
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(
            parsed.event_map.get("2025-03-01::09:00 Standup").map(String::as_str),
            Some("evt-1")
        );
        assert_eq!(parsed.calendar_id, "primary");
    }

    #[test]
    fn load_save_roundtrip_binds_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::load_from(&path).unwrap();
        settings.calendar_id = "team@example.com".into();
        settings.event_map.insert("k".into(), "v".into());
        settings.save().unwrap();

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded.calendar_id, "team@example.com");
        assert_eq!(reloaded.event_map.get("k").map(String::as_str), Some("v"));
        assert_eq!(reloaded.save_path().unwrap(), path);
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "calendar_id = [not toml").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn note_path_appends_extension_once() {
        let settings = Settings::default();
        assert_eq!(
            settings.note_path_for(date(2025, 3, 1)),
            PathBuf::from("Daily/2025-03-01.md")
        );
    }

    #[test]
    fn date_from_filename_is_strict() {
        let settings = Settings::default();
        assert_eq!(
            settings.date_from_filename(Path::new("Daily/2025-03-01.md")),
            Some(date(2025, 3, 1))
        );
        assert_eq!(settings.date_from_filename(Path::new("Daily/notes.md")), None);
        assert_eq!(
            settings.date_from_filename(Path::new("Daily/2025-03-01-extra.md")),
            None
        );
    }

    #[test]
    fn invalid_format_string_falls_back_to_iso() {
        assert_eq!(format_date(date(2025, 3, 1), "%Y-%m-%d"), "2025-03-01");
        assert_eq!(format_date(date(2025, 3, 1), "%Q"), "2025-03-01");
    }

    #[test]
    fn get_and_set_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.get("calendar_id").as_deref(), Some("primary"));
        assert_eq!(settings.get("default_duration_minutes").as_deref(), Some("60"));
        assert!(settings.get("nope").is_none());

        settings.set("default_duration_minutes", "45").unwrap();
        assert_eq!(settings.default_duration_minutes, 45);
        settings.set("auto_sync", "true").unwrap();
        assert!(settings.auto_sync);

        assert!(matches!(
            settings.set("nope", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("auto_sync", "not-a-bool"),
            Err(ConfigError::InvalidValue { .. })
        ));

        // Changes were persisted.
        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded.default_duration_minutes, 45);
        assert!(reloaded.auto_sync);
    }
}
