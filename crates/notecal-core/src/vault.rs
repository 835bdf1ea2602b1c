//! Host document layer.
//!
//! The engine never touches the filesystem directly; it goes through
//! [`NoteVault`] so editor plugins or tests can supply their own document
//! store. [`FsVault`] is the plain-filesystem implementation used by the
//! CLI.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::VaultError;

/// Document access the engine needs from its host.
pub trait NoteVault {
    /// Full text of a note. Fails with [`VaultError::NotFound`] if the
    /// note does not exist.
    fn read_note(&self, path: &Path) -> Result<String, VaultError>;

    /// All markdown notes under `folder`, recursively, in a stable
    /// order. A missing folder is an empty listing, not an error.
    fn list_notes(&self, folder: &Path) -> Result<Vec<PathBuf>, VaultError>;

    /// Current calendar date in the host's local zone.
    fn today(&self) -> NaiveDate;
}

/// Filesystem-backed vault. Paths resolve relative to the process
/// working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsVault;

impl FsVault {
    pub fn new() -> Self {
        Self
    }
}

impl NoteVault for FsVault {
    fn read_note(&self, path: &Path) -> Result<String, VaultError> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::NotFound(path.to_path_buf())
            } else {
                VaultError::Io(e)
            }
        })
    }

    fn list_notes(&self, folder: &Path) -> Result<Vec<PathBuf>, VaultError> {
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        let mut stack = vec![folder.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|ext| ext == "md") {
                    notes.push(path);
                }
            }
        }
        notes.sort();
        Ok(notes)
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
