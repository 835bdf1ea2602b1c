//! Sync subcommands: one-shot syncs and the polling watch loop.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Subcommand;
use notecal_core::{FsVault, Settings, SyncEngine, SyncOutcome};

/// Sync actions.
#[derive(Subcommand)]
pub enum SyncAction {
    /// Sync today's daily note
    Today,
    /// Sync every daily note in the configured folder
    All,
    /// Sync a single note
    Note {
        /// Path to the note
        path: PathBuf,
        /// Date to sync the note as (defaults to the date in the filename)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Poll the daily folder and sync notes whose schedule changed
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

/// Run the sync command.
pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let settings = Settings::load()?;
        let mut engine = SyncEngine::new(FsVault::new(), settings);

        match action {
            SyncAction::Today => {
                match engine.sync_today().await? {
                    Some(outcome) => println!("{}", summarize(&outcome)),
                    None => println!("no daily note for today"),
                }
            }
            SyncAction::All => {
                let outcome = engine.sync_all().await?;
                println!("{}", summarize(&outcome));
            }
            SyncAction::Note { path, date } => {
                let date = match date.or_else(|| engine.settings().date_from_filename(&path)) {
                    Some(date) => date,
                    None => {
                        return Err(format!(
                            "cannot derive a date from '{}'; pass --date YYYY-MM-DD",
                            path.display()
                        )
                        .into())
                    }
                };
                let outcome = engine.sync_note(&path, date).await?;
                println!("{}", summarize(&outcome));
            }
            SyncAction::Watch { interval } => {
                watch(&mut engine, interval).await?;
            }
        }
        Ok(())
    })
}

/// Poll the daily folder, syncing only notes whose schedule digest
/// changed. Runs until interrupted.
async fn watch(
    engine: &mut SyncEngine<FsVault>,
    interval_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if !engine.settings().auto_sync {
        return Err(
            "auto_sync is disabled; enable it with `notecal-cli config set auto_sync true`".into(),
        );
    }

    let primed = engine.prime_hashes()?;
    println!("watching daily folder ({primed} notes primed, polling every {interval_secs}s)");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match engine.sync_changed().await {
            Ok(outcome) if outcome == SyncOutcome::default() => {}
            Ok(outcome) => println!("{}", summarize(&outcome)),
            Err(e) => eprintln!("sync failed: {e}"),
        }
    }
}

fn summarize(outcome: &SyncOutcome) -> String {
    let entries = match outcome.entries_synced {
        1 => "1 entry".to_string(),
        n => format!("{n} entries"),
    };
    let mut text = format!("synced {entries}");
    if outcome.events_removed > 0 {
        text.push_str(&format!(", removed {}", outcome.events_removed));
    }
    if outcome.failures > 0 {
        text.push_str(&format!(", {} failed", outcome.failures));
    }
    text
}
