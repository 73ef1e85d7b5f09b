//! Tally - merchant metrics sync and cache service
//!
//! # Usage
//!
//! ```bash
//! # Keep every account's rolling window fresh
//! tally serve --config configs/tally.toml
//!
//! # One pass now, ignoring freshness
//! tally sync --account acme --force
//!
//! # Metrics for a range as JSON
//! tally read --account acme --start 2024-03-01 --end 2024-03-31
//!
//! # Drop everything cached for an account
//! tally purge --account acme
//! ```

mod app;
mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tally_config::{Config, LogFormat, LogLevel, LogOutput};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tally - merchant metrics sync and cache service
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sync scheduler until interrupted
    Serve,

    /// Run one sync pass and exit
    Sync(cmd::sync::SyncArgs),

    /// Print metrics for an account and date range as JSON
    Read(cmd::read::ReadArgs),

    /// Show cache status per data kind
    Status(cmd::status::StatusArgs),

    /// Remove expired cache entries, or everything for one account
    Purge(cmd::purge::PurgeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(level, config.log.format, &config.log.output)?;

    match cli.command {
        Command::Serve => cmd::serve::run(config).await,
        Command::Sync(args) => cmd::sync::run(config, args).await,
        Command::Read(args) => cmd::read::run(config, args).await,
        Command::Status(args) => cmd::status::run(config, args).await,
        Command::Purge(args) => cmd::purge::run(config, args).await,
    }
}

/// Load the config file, or defaults when none is given or found
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    let default_paths = [
        PathBuf::from("configs/tally.toml"),
        PathBuf::from("tally.toml"),
    ];
    for path in &default_paths {
        if path.exists() {
            return Config::from_file(path).context("failed to load configuration");
        }
    }

    Ok(Config::default())
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> LogLevel {
    cli_level
        .and_then(|level| level.parse().ok())
        .unwrap_or(config.log.level)
}

/// Initialize the tracing subscriber for logging
///
/// `RUST_LOG` wins over the resolved level when set.
fn init_logging(level: LogLevel, format: LogFormat, output: &LogOutput) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.filter_directive()))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let to_stdout = *output == LogOutput::Stdout;
    let registry = tracing_subscriber::registry().with(filter);

    match (format, to_stdout) {
        (LogFormat::Json, true) => registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .init(),
        (LogFormat::Json, false) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (LogFormat::Console, true) => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
            .init(),
        (LogFormat::Console, false) => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_read() {
        let cli = Cli::try_parse_from([
            "tally", "read", "--account", "acme", "--start", "2024-03-01", "--end", "2024-03-31",
        ])
        .unwrap();
        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.account, "acme");
                assert_eq!(args.start, "2024-03-01");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tally", "sync", "--force", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Sync(ref a) if a.force && a.account.is_none()));
    }

    #[test]
    fn test_cli_parses_purge() {
        let cli = Cli::try_parse_from(["tally", "purge"]).unwrap();
        assert!(matches!(cli.command, Command::Purge(ref a) if a.account.is_none()));

        let cli = Cli::try_parse_from([
            "tally", "purge", "--account", "acme", "--start", "2024-03-01", "--end", "2024-03-30",
        ])
        .unwrap();
        match cli.command {
            Command::Purge(args) => {
                assert_eq!(args.account.as_deref(), Some("acme"));
                assert_eq!(args.end.as_deref(), Some("2024-03-30"));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // a range needs an account
        assert!(
            Cli::try_parse_from(["tally", "purge", "--start", "2024-03-01", "--end", "2024-03-30"])
                .is_err()
        );
    }

    #[test]
    fn test_cli_parses_ads_overview() {
        let cli = Cli::try_parse_from([
            "tally", "read", "-a", "acme", "-s", "2024-03-01", "-e", "2024-03-31", "--ads-overview",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Read(ref a) if a.ads_overview && !a.compact));
    }

    #[test]
    fn test_resolve_log_level() {
        let config: Config = "[log]\nlevel = \"warn\"".parse().unwrap();
        assert_eq!(resolve_log_level(Some("debug"), &config), LogLevel::Debug);
        assert_eq!(resolve_log_level(None, &config), LogLevel::Warn);
        // unparseable flag falls back to config
        assert_eq!(resolve_log_level(Some("loud"), &config), LogLevel::Warn);
        assert_eq!(resolve_log_level(None, &Config::default()), LogLevel::Info);
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let err = load_config(Some(Path::new("/nonexistent/tally.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "[sync]\nwindow_days = 7\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sync.window_days, 7);
    }
}
