//! Credential checks for the configured service account.

use clap::Subcommand;
use notecal_core::{Settings, TokenBroker};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Exchange one token to verify the configured service account
    Verify,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Verify => {
            let settings = Settings::load()?;
            let account = settings.service_account();

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let broker = TokenBroker::new();
                broker.access_token(&account).await
            })?;

            println!("service account OK ({})", account.client_email);
        }
    }
    Ok(())
}
