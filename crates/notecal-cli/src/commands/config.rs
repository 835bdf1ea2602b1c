//! Configuration subcommands over the settings blob.

use clap::Subcommand;
use notecal_core::Settings;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a settings value
    Get {
        /// Settings key (e.g. "calendar_id", "schedule_heading")
        key: String,
    },
    /// Set a settings value
    Set {
        /// Settings key
        key: String,
        /// New value
        value: String,
    },
    /// Show all settings (private key redacted)
    Show,
    /// Print the settings file path
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let settings = Settings::load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            settings.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::Show => {
            let mut settings = Settings::load()?;
            if !settings.sa_private_key.is_empty() {
                settings.sa_private_key = "<redacted>".to_string();
            }
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        ConfigAction::Path => {
            let settings = Settings::load()?;
            println!("{}", settings.save_path()?.display());
        }
    }
    Ok(())
}
