//! Fakes and fixtures shared by the sync integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tally_cache::{CachePolicy, ManualClock, MemoryCacheStore};
use tally_connectors::{AdSource, CommerceSource, ConnectorError, FulfillmentSource};
use tally_model::{
    AccountCredentials, AdCredentials, AdDailyReport, AdDay, AdOverview, CanonicalOrder,
    CommerceCredentials, DateRange, FulfillmentCredentials, LineItem, ShipmentRecord,
    ShipmentStatus,
};
use tally_sync::{
    Aggregator, ReadPath, StaticCostLedger, StaticCredentialStore, SyncScheduler, SyncSettings,
};

/// 2024-03-30 15:30 in Asia/Kolkata
pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-30T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Rolling 30-day window ending on t0's business day
pub fn window() -> DateRange {
    DateRange::parse("2024-03-01", "2024-03-30").unwrap()
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn order(
    id: &str,
    at: &str,
    amount: f64,
    product: Option<&str>,
    quantity: u32,
) -> CanonicalOrder {
    CanonicalOrder {
        id: id.to_string(),
        timestamp: DateTime::parse_from_rfc3339(at).unwrap(),
        total_amount: amount,
        line_items: vec![LineItem {
            product_id: product.map(str::to_string),
            quantity,
        }],
    }
}

pub fn shipment(id: &str, date: &str, freight: f64, cod: f64) -> ShipmentRecord {
    ShipmentRecord {
        id: id.to_string(),
        order_date: day(date),
        status: ShipmentStatus::Delivered,
        raw_status: "DELIVERED".to_string(),
        freight_cost: freight,
        cod_charge: cod,
        rto_surcharge: 0.0,
        payment_method: "cod".to_string(),
    }
}

/// Zero-filled report with spend on the given days
pub fn ad_report(range: &DateRange, spend: &[(&str, f64)]) -> AdDailyReport {
    let mut report: AdDailyReport = range.days().map(|d| (d, AdDay::default())).collect();
    for (date, amount) in spend {
        report.insert(day(date), AdDay::from_counters(*amount, 1000, 10, 800, 0.0));
    }
    report
}

pub fn account(id: &str) -> AccountCredentials {
    AccountCredentials {
        account_id: id.to_string(),
        commerce: Some(CommerceCredentials {
            shop_domain: format!("{}.myshopify.com", id),
            access_token: "shpat_test".to_string(),
        }),
        ads: Some(AdCredentials {
            ad_account_id: "42".to_string(),
            access_token: "EAAB_test".to_string(),
        }),
        fulfillment: Some(FulfillmentCredentials {
            api_token: "sr_test".to_string(),
        }),
    }
}

fn scripted<T: Clone>(slot: &Mutex<Option<T>>, calls: &AtomicUsize) -> Result<T, ConnectorError> {
    calls.fetch_add(1, Ordering::SeqCst);
    slot.lock()
        .unwrap()
        .clone()
        .ok_or_else(|| ConnectorError::AuthFailed("token revoked".into()))
}

/// Commerce source returning scripted orders (`None` = failure)
#[derive(Default)]
pub struct FakeCommerce {
    pub orders: Mutex<Option<Vec<CanonicalOrder>>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CommerceSource for FakeCommerce {
    fn name(&self) -> &'static str {
        "fake-commerce"
    }

    async fn orders(
        &self,
        _credentials: &CommerceCredentials,
        _range: &DateRange,
    ) -> Result<Vec<CanonicalOrder>, ConnectorError> {
        scripted(&self.orders, &self.calls)
    }
}

/// Ad source returning a scripted report (`None` = failure)
#[derive(Default)]
pub struct FakeAds {
    pub report: Mutex<Option<AdDailyReport>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AdSource for FakeAds {
    fn name(&self) -> &'static str {
        "fake-ads"
    }

    async fn daily(
        &self,
        _credentials: &AdCredentials,
        _range: &DateRange,
    ) -> Result<AdDailyReport, ConnectorError> {
        scripted(&self.report, &self.calls)
    }

    async fn overview(
        &self,
        _credentials: &AdCredentials,
        _range: &DateRange,
    ) -> Result<AdOverview, ConnectorError> {
        let report = scripted(&self.report, &self.calls)?;
        let spend = report.values().map(|d| d.spend).sum();
        Ok(AdDay::from_counters(spend, 0, 0, 0, 0.0))
    }
}

/// Fulfillment source returning scripted shipments (`None` = failure)
#[derive(Default)]
pub struct FakeFulfillment {
    pub shipments: Mutex<Option<Vec<ShipmentRecord>>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FulfillmentSource for FakeFulfillment {
    fn name(&self) -> &'static str {
        "fake-fulfillment"
    }

    async fn shipments(
        &self,
        _credentials: &FulfillmentCredentials,
        _range: &DateRange,
    ) -> Result<Vec<ShipmentRecord>, ConnectorError> {
        scripted(&self.shipments, &self.calls)
    }
}

/// Wired-up engine over fakes, a manual clock and an in-memory cache
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub cache: Arc<MemoryCacheStore>,
    pub commerce: Arc<FakeCommerce>,
    pub ads: Arc<FakeAds>,
    pub fulfillment: Arc<FakeFulfillment>,
    pub aggregator: Arc<Aggregator>,
    pub scheduler: SyncScheduler,
    pub read: ReadPath,
}

impl Harness {
    /// Reference scenario: 3 orders worth 3000, COGS 500, ad spend 200, shipping 100
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        let commerce = Arc::new(FakeCommerce::default());
        *commerce.orders.lock().unwrap() = Some(vec![
            order("1001", "2024-03-05T11:00:00+05:30", 1000.0, Some("501"), 2),
            order("1002", "2024-03-10T18:30:00+05:30", 1000.0, None, 1),
            order("1003", "2024-03-20T09:15:00+05:30", 1000.0, Some("999"), 1),
        ]);

        let ads = Arc::new(FakeAds::default());
        *ads.report.lock().unwrap() = Some(ad_report(
            &window(),
            &[("2024-03-05", 120.0), ("2024-03-20", 80.0)],
        ));

        let fulfillment = Arc::new(FakeFulfillment::default());
        *fulfillment.shipments.lock().unwrap() = Some(vec![
            shipment("s1", "2024-03-05", 40.0, 10.0),
            shipment("s2", "2024-03-10", 30.0, 0.0),
            shipment("s3", "2024-03-20", 20.0, 0.0),
        ]);

        // 2 x 250 = 500; product 999 has no cost entry
        let ledger = StaticCostLedger::new().with_cost("acct_1", "501", 250.0);

        Self::build(accounts, commerce, ads, fulfillment, Arc::new(ledger))
    }

    /// Every source returns nothing
    pub fn empty(accounts: Vec<AccountCredentials>) -> Self {
        let commerce = Arc::new(FakeCommerce::default());
        *commerce.orders.lock().unwrap() = Some(Vec::new());
        let ads = Arc::new(FakeAds::default());
        *ads.report.lock().unwrap() = Some(ad_report(&window(), &[]));
        let fulfillment = Arc::new(FakeFulfillment::default());
        *fulfillment.shipments.lock().unwrap() = Some(Vec::new());

        Self::build(accounts, commerce, ads, fulfillment, Arc::new(StaticCostLedger::new()))
    }

    fn build(
        accounts: Vec<AccountCredentials>,
        commerce: Arc<FakeCommerce>,
        ads: Arc<FakeAds>,
        fulfillment: Arc<FakeFulfillment>,
        ledger: Arc<StaticCostLedger>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = Arc::new(MemoryCacheStore::with_clock(
            CachePolicy::default(),
            clock.clone(),
        ));
        let credentials = Arc::new(StaticCredentialStore::new(accounts));
        let aggregator = Arc::new(Aggregator::new(
            commerce.clone(),
            ads.clone(),
            fulfillment.clone(),
            ledger,
        ));
        let scheduler = SyncScheduler::new(
            aggregator.clone(),
            cache.clone(),
            credentials.clone(),
            SyncSettings::default(),
        );
        let read = ReadPath::new(aggregator.clone(), cache.clone(), credentials);

        Self {
            clock,
            cache,
            commerce,
            ads,
            fulfillment,
            aggregator,
            scheduler,
            read,
        }
    }

    pub fn commerce_calls(&self) -> usize {
        self.commerce.calls.load(Ordering::SeqCst)
    }

    pub fn fail_ads(&self) {
        *self.ads.report.lock().unwrap() = None;
    }

    pub fn fail_commerce(&self) {
        *self.commerce.orders.lock().unwrap() = None;
    }

    pub fn fail_fulfillment(&self) {
        *self.fulfillment.shipments.lock().unwrap() = None;
    }

    pub fn advance(&self, by: TimeDelta) {
        self.clock.advance(by);
    }
}
