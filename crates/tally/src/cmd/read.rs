//! Read command - metrics for an account and date range as JSON

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tally_config::Config;

use crate::app::App;

/// Read command arguments
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Account id
    #[arg(short, long)]
    pub account: String,

    /// First day, YYYY-MM-DD
    #[arg(short, long)]
    pub start: String,

    /// Last day (inclusive), YYYY-MM-DD
    #[arg(short, long)]
    pub end: String,

    /// Print the live range-level ad overview instead of cached metrics
    #[arg(long)]
    pub ads_overview: bool,

    /// Print JSON on one line
    #[arg(long)]
    pub compact: bool,
}

/// Run the read command
pub async fn run(config: Config, args: ReadArgs) -> Result<()> {
    let app = App::build(config).await?;
    let read = app.read_path();

    if args.ads_overview {
        let overview = read
            .ad_overview(&args.account, &args.start, &args.end)
            .await
            .context("ad overview failed")?
            .with_context(|| format!("no ad credentials for account {}", args.account))?;
        return print_json(&overview, args.compact);
    }

    let response = read
        .metrics(&args.account, &args.start, &args.end)
        .await
        .context("read failed")?;
    print_json(&response, args.compact)
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}
