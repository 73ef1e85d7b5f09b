//! Sync command - one pass over all accounts or a single one

use anyhow::{Context, Result};
use clap::Args;
use tally_config::Config;

use crate::app::App;

/// Sync command arguments
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only this account (must have all credentials)
    #[arg(short, long)]
    pub account: Option<String>,

    /// Refresh even if the cached summary is still fresh
    #[arg(short, long)]
    pub force: bool,
}

/// Run the sync command
pub async fn run(config: Config, args: SyncArgs) -> Result<()> {
    let app = App::build(config).await?;
    let report = app
        .scheduler()
        .sync(args.account.as_deref(), args.force)
        .await
        .context("sync failed")?;

    println!(
        "accounts: {}  refreshed: {}  fresh: {}  failed: {}  purged: {}",
        report.accounts, report.refreshed, report.fresh, report.failed, report.purged
    );

    if report.failed > 0 {
        anyhow::bail!("{} account(s) failed to sync", report.failed);
    }
    Ok(())
}
