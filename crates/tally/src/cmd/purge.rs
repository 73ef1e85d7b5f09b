//! Purge command - remove cache entries
//!
//! With no arguments only expired entries go. `--account` drops everything
//! cached for one account, or just one range with `--start`/`--end`.

use anyhow::{Context, Result};
use clap::Args;
use tally_config::Config;
use tally_model::{CacheKey, DataKind, DateRange};

use crate::app::App;

/// Purge command arguments
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Drop entries for this account, fresh or not
    #[arg(short, long)]
    pub account: Option<String>,

    /// First day of the range to drop, YYYY-MM-DD
    #[arg(short, long, requires_all = ["account", "end"])]
    pub start: Option<String>,

    /// Last day of the range to drop, YYYY-MM-DD
    #[arg(short, long, requires = "start")]
    pub end: Option<String>,
}

/// Run the purge command
pub async fn run(config: Config, args: PurgeArgs) -> Result<()> {
    let app = App::build(config).await?;
    let cache = &app.cache;

    match (args.account.as_deref(), args.start.as_deref(), args.end.as_deref()) {
        (Some(account), Some(start), Some(end)) => {
            let range = DateRange::parse(start, end)?;
            let mut removed = 0u64;
            for kind in DataKind::ALL {
                let key = CacheKey::new(account, kind, range);
                if cache.clear(&key).await.context("failed to clear cache entry")? {
                    removed += 1;
                }
            }
            println!("purged {} entries for {} {}", removed, account, range);
        }
        (Some(account), _, _) => {
            let removed = cache
                .clear_account(account)
                .await
                .context("failed to clear account")?;
            println!("purged {} entries for {}", removed, account);
        }
        _ => {
            let removed = cache
                .purge_expired()
                .await
                .context("failed to purge cache")?;
            println!("purged {} expired entries", removed);
        }
    }
    Ok(())
}
