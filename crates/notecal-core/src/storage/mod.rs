mod settings;

pub use settings::Settings;

use std::path::PathBuf;

/// Returns `~/.config/notecal[-dev]/` based on NOTECAL_ENV.
///
/// Set NOTECAL_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NOTECAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("notecal-dev")
    } else {
        base_dir.join("notecal")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
