//! Status command - cache state per data kind

use anyhow::{Context, Result};
use clap::Args;
use tally_config::Config;
use tally_connectors::business_today;
use tally_model::DateRange;

use crate::app::App;

/// Status command arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Account id
    #[arg(short, long)]
    pub account: String,

    /// First day, YYYY-MM-DD (default: start of the rolling window)
    #[arg(short, long, requires = "end")]
    pub start: Option<String>,

    /// Last day, YYYY-MM-DD (default: today)
    #[arg(short, long, requires = "start")]
    pub end: Option<String>,
}

/// Run the status command
pub async fn run(config: Config, args: StatusArgs) -> Result<()> {
    let app = App::build(config).await?;

    let range = match (args.start.as_deref(), args.end.as_deref()) {
        (Some(start), Some(end)) => DateRange::parse(start, end)?,
        _ => {
            let today = business_today(app.cache.clock().now(), app.config.sync.timezone);
            DateRange::rolling(today, app.config.sync.window_days)?
        }
    };

    let statuses = app
        .read_path()
        .status(
            &args.account,
            &range.start_date.to_string(),
            &range.end_date.to_string(),
        )
        .await
        .context("failed to read cache status")?;

    println!("{} {}", args.account, range);
    println!(
        "{:<12} {:<8} {:<26} {:<26} ERROR",
        "KIND", "STATUS", "SYNCED", "EXPIRES"
    );
    for s in statuses {
        let status = s.status.map(|st| st.as_str()).unwrap_or("-");
        let synced = s
            .synced_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        let expires = s
            .expires_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<12} {:<8} {:<26} {:<26} {}",
            s.data_kind.as_str(),
            status,
            synced,
            expires,
            s.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
