//! Tally - Sync
//!
//! Turns connector output into cached financial metrics.
//!
//! # Components
//!
//! - [`Aggregator`] - concurrent per-source fetch plus a deterministic merge
//! - [`SyncScheduler`] - interval-driven refresh of every account's rolling window
//! - [`ReadPath`] - cache-first reads with on-demand aggregation on a miss
//! - [`CostLedger`] / [`CredentialStore`] - per-account costs and credentials
//!
//! # Failure model
//!
//! A failing connector degrades to a zero contribution and is reported as a
//! degraded source. Cache failures are hard errors. A sale-less result is a
//! distinct "no data" outcome, never a zero-revenue metrics record.

mod aggregator;
mod credentials;
mod error;
mod ledger;
mod read;
mod scheduler;

pub use aggregator::{Aggregation, Aggregator, SourceData};
pub use credentials::{CredentialStore, StaticCredentialStore};
pub use error::{Result, SyncError};
pub use ledger::{CostLedger, StaticCostLedger, TursoCostLedger};
pub use read::{KindStatus, MetricsView, ReadPath, ReadResponse, Unavailable, UnavailableReason};
pub use scheduler::{
    AccountSync, DEFAULT_INTERVAL_SECS, DEFAULT_WINDOW_DAYS, SyncScheduler, SyncSettings,
    TickReport, no_data_message,
};
