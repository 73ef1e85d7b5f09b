//! Wiring from config to running components

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tally_cache::{CachePolicy, CacheStore, MemoryCacheStore, TursoCacheStore};
use tally_config::Config;
use tally_connectors::{
    AdConnector, AdsConnectorConfig, CommerceConnector, CommerceConnectorConfig,
    FulfillmentConnector, FulfillmentConnectorConfig,
};
use tally_sync::{
    Aggregator, CostLedger, CredentialStore, ReadPath, StaticCostLedger, StaticCredentialStore,
    SyncScheduler, SyncSettings, TursoCostLedger,
};
use tracing::info;

/// Shared components built once per process
pub struct App {
    pub config: Config,
    pub cache: Arc<dyn CacheStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub aggregator: Arc<Aggregator>,
}

impl App {
    /// Build connectors, cache, ledger and credentials from config
    pub async fn build(config: Config) -> Result<Self> {
        let tz = config.sync.timezone;

        let commerce_config = CommerceConnectorConfig::from_toml(&config.connectors.commerce())
            .context("invalid [connectors.commerce]")?;
        let ads_config = AdsConnectorConfig::from_toml(&config.connectors.ads())
            .context("invalid [connectors.ads]")?;
        let fulfillment_config =
            FulfillmentConnectorConfig::from_toml(&config.connectors.fulfillment())
                .context("invalid [connectors.fulfillment]")?;

        let commerce = CommerceConnector::from_config(&commerce_config, tz)
            .context("failed to create commerce connector")?;
        let ads = AdConnector::from_config(&ads_config).context("failed to create ads connector")?;
        let fulfillment = FulfillmentConnector::from_config(&fulfillment_config, tz)
            .context("failed to create fulfillment connector")?;

        let policy = CachePolicy::new(config.sync.freshness_secs, config.sync.ttl_days);
        let (cache, ledger) = open_storage(&config, policy).await?;

        let credentials: Arc<dyn CredentialStore> = Arc::new(StaticCredentialStore::new(
            config
                .accounts
                .iter()
                .map(|a| a.credentials.clone())
                .collect(),
        ));

        let aggregator = Arc::new(Aggregator::new(
            Arc::new(commerce),
            Arc::new(ads),
            Arc::new(fulfillment),
            ledger,
        ));

        info!(
            accounts = config.accounts.len(),
            timezone = %tz,
            memory = config.cache.memory,
            "components ready"
        );

        Ok(Self {
            config,
            cache,
            credentials,
            aggregator,
        })
    }

    pub fn scheduler(&self) -> SyncScheduler {
        let settings = SyncSettings {
            interval: Duration::from_secs(self.config.sync.interval_secs),
            window_days: self.config.sync.window_days,
            timezone: self.config.sync.timezone,
        };
        SyncScheduler::new(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.cache),
            Arc::clone(&self.credentials),
            settings,
        )
    }

    pub fn read_path(&self) -> ReadPath {
        ReadPath::new(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.cache),
            Arc::clone(&self.credentials),
        )
    }
}

/// Open the cache store and a cost ledger seeded from `[[accounts]]` costs
///
/// A file-backed cache shares its database with the ledger.
async fn open_storage(
    config: &Config,
    policy: CachePolicy,
) -> Result<(Arc<dyn CacheStore>, Arc<dyn CostLedger>)> {
    if config.cache.memory {
        let mut ledger = StaticCostLedger::new();
        for account in &config.accounts {
            for (product_id, unit_cost) in &account.costs {
                ledger = ledger.with_cost(account.account_id(), product_id, *unit_cost);
            }
        }
        return Ok((Arc::new(MemoryCacheStore::new(policy)), Arc::new(ledger)));
    }

    let store = TursoCacheStore::open(&config.cache.path, policy)
        .await
        .context("failed to open cache database")?;
    let ledger = TursoCostLedger::new(store.database().clone())
        .await
        .context("failed to open cost ledger")?;

    let now = Utc::now();
    for account in &config.accounts {
        for entry in account.cost_entries(now) {
            ledger
                .set_cost(account.account_id(), &entry)
                .await
                .with_context(|| format!("failed to store costs for {}", account.account_id()))?;
        }
    }

    Ok((Arc::new(store), Arc::new(ledger)))
}
