//! Behaviour shared by every cache store

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tally_cache::{
    CacheError, CachePolicy, CacheStatus, CacheStore, ManualClock, MemoryCacheStore,
    TursoCacheStore,
};
use tally_model::{
    AdDailyReport, AdDay, AggregatedMetrics, CacheKey, CachePayload, DataKind, DateRange,
    MetricTotals,
};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-30T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn range() -> DateRange {
    DateRange::parse("2024-03-01", "2024-03-30").unwrap()
}

fn summary_key(account: &str) -> CacheKey {
    CacheKey::new(account, DataKind::AggregatedSummary, range())
}

fn summary(account: &str, revenue: f64) -> CachePayload {
    let totals = MetricTotals {
        revenue,
        orders: 3,
        cogs: 500.0,
        ad_spend: 200.0,
        shipping_cost: 100.0,
    };
    CachePayload::AggregatedSummary(AggregatedMetrics::from_totals(
        account,
        range(),
        &totals,
        Vec::new(),
    ))
}

fn ads_payload() -> CachePayload {
    let mut report = AdDailyReport::new();
    for day in range().days() {
        report.insert(day, AdDay::from_counters(10.0, 1000, 5, 800, 2.0));
    }
    CachePayload::Ads(report)
}

async fn stores() -> Vec<(&'static str, Box<dyn CacheStore>, Arc<ManualClock>)> {
    let policy = CachePolicy::default();

    let memory_clock = Arc::new(ManualClock::new(t0()));
    let memory = MemoryCacheStore::with_clock(policy, memory_clock.clone());

    let turso_clock = Arc::new(ManualClock::new(t0()));
    let turso = TursoCacheStore::in_memory(policy)
        .await
        .unwrap()
        .with_clock(turso_clock.clone());

    vec![
        ("memory", Box::new(memory) as Box<dyn CacheStore>, memory_clock),
        ("turso", Box::new(turso), turso_clock),
    ]
}

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn test_set_then_get_round_trips() {
    for (name, store, _) in stores().await {
        let key = summary_key("acct_1");
        assert!(store.get(&key).await.unwrap().is_none(), "{name}");

        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(summary("acct_1", 3000.0)),
            "{name}"
        );

        let ads_key = key.with_kind(DataKind::Ads);
        store.set(&ads_key, ads_payload()).await.unwrap();
        assert_eq!(store.get(&ads_key).await.unwrap(), Some(ads_payload()), "{name}");
    }
}

#[tokio::test]
async fn test_set_overwrites() {
    for (name, store, clock) in stores().await {
        let key = summary_key("acct_1");
        store.set(&key, summary("acct_1", 1000.0)).await.unwrap();
        clock.advance(TimeDelta::minutes(5));
        store.set(&key, summary("acct_1", 2000.0)).await.unwrap();

        let entry = store.entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.payload, Some(summary("acct_1", 2000.0)), "{name}");
        assert_eq!(entry.synced_at, Some(t0() + TimeDelta::minutes(5)), "{name}");
        assert_eq!(entry.status, CacheStatus::Success, "{name}");
    }
}

#[tokio::test]
async fn test_kind_mismatch_rejected() {
    for (name, store, _) in stores().await {
        let key = summary_key("acct_1").with_kind(DataKind::Commerce);
        let err = store.set(&key, ads_payload()).await.unwrap_err();
        assert!(
            matches!(
                err,
                CacheError::KindMismatch {
                    key: DataKind::Commerce,
                    payload: DataKind::Ads
                }
            ),
            "{name}"
        );
        assert!(store.entry(&key).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_overlapping_ranges_are_independent() {
    for (name, store, _) in stores().await {
        let wide = summary_key("acct_1");
        let narrow = CacheKey::new(
            "acct_1",
            DataKind::AggregatedSummary,
            DateRange::parse("2024-03-10", "2024-03-20").unwrap(),
        );
        store.set(&wide, summary("acct_1", 3000.0)).await.unwrap();
        assert!(store.get(&narrow).await.unwrap().is_none(), "{name}");
        assert!(store.should_refresh(&narrow).await.unwrap(), "{name}");
    }
}

// =============================================================================
// Staleness
// =============================================================================

#[tokio::test]
async fn test_should_refresh_follows_freshness_window() {
    for (name, store, clock) in stores().await {
        let key = summary_key("acct_1");
        assert!(store.should_refresh(&key).await.unwrap(), "{name}: absent");

        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
        assert!(!store.should_refresh(&key).await.unwrap(), "{name}: just set");

        clock.advance(TimeDelta::minutes(30));
        assert!(!store.should_refresh(&key).await.unwrap(), "{name}: at window");

        clock.advance(TimeDelta::seconds(1));
        assert!(store.should_refresh(&key).await.unwrap(), "{name}: past window");
    }
}

#[tokio::test]
async fn test_mark_failed_forces_refresh_but_keeps_payload() {
    for (name, store, _) in stores().await {
        let key = summary_key("acct_1");
        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
        store.mark_failed(&key, "commerce: 401").await.unwrap();

        assert!(store.should_refresh(&key).await.unwrap(), "{name}");
        let entry = store.entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Failed, "{name}");
        assert_eq!(entry.error_message.as_deref(), Some("commerce: 401"), "{name}");
        assert_eq!(entry.synced_at, Some(t0()), "{name}");
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(summary("acct_1", 3000.0)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_syncing_then_success() {
    for (name, store, clock) in stores().await {
        let key = summary_key("acct_1");
        store.mark_syncing(&key).await.unwrap();

        let entry = store.entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Syncing, "{name}");
        assert!(entry.payload.is_none(), "{name}");
        assert!(store.should_refresh(&key).await.unwrap(), "{name}");

        clock.advance(TimeDelta::seconds(5));
        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
        let entry = store.entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Success, "{name}");
        assert!(entry.error_message.is_none(), "{name}");
        assert!(!store.should_refresh(&key).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_failed_without_prior_success() {
    for (name, store, _) in stores().await {
        let key = summary_key("acct_1");
        store.mark_failed(&key, "no data").await.unwrap();
        let entry = store.entry(&key).await.unwrap().unwrap();
        assert!(entry.payload.is_none(), "{name}");
        assert!(entry.synced_at.is_none(), "{name}");
        assert!(store.get(&key).await.unwrap().is_none(), "{name}");
    }
}

// =============================================================================
// Expiry and clearing
// =============================================================================

#[tokio::test]
async fn test_ttl_expiry_and_purge() {
    for (name, store, clock) in stores().await {
        let old = summary_key("acct_1");
        store.set(&old, summary("acct_1", 3000.0)).await.unwrap();

        clock.advance(TimeDelta::days(6));
        let recent = old.with_kind(DataKind::Ads);
        store.set(&recent, ads_payload()).await.unwrap();

        clock.advance(TimeDelta::days(1));
        assert!(store.get(&old).await.unwrap().is_none(), "{name}: expired");
        assert!(store.get(&recent).await.unwrap().is_some(), "{name}: live");

        assert_eq!(store.purge_expired().await.unwrap(), 1, "{name}");
        assert_eq!(store.purge_expired().await.unwrap(), 0, "{name}");
        assert!(store.get(&recent).await.unwrap().is_some(), "{name}");
    }
}

#[tokio::test]
async fn test_mark_failed_after_expiry_drops_old_payload() {
    for (name, store, clock) in stores().await {
        let key = summary_key("acct_1");
        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
        clock.advance(TimeDelta::days(8));

        store.mark_failed(&key, "timeout").await.unwrap();
        let entry = store.entry(&key).await.unwrap().unwrap();
        assert!(entry.payload.is_none(), "{name}");
        assert_eq!(entry.status, CacheStatus::Failed, "{name}");
    }
}

#[tokio::test]
async fn test_clear_and_clear_account() {
    for (name, store, _) in stores().await {
        let a = summary_key("acct_a");
        let b = summary_key("acct_b");
        store.set(&a, summary("acct_a", 1.0)).await.unwrap();
        store.set(&a.with_kind(DataKind::Ads), ads_payload()).await.unwrap();
        store.set(&b, summary("acct_b", 2.0)).await.unwrap();

        assert!(store.clear(&a).await.unwrap(), "{name}");
        assert!(!store.clear(&a).await.unwrap(), "{name}");

        assert_eq!(store.clear_account("acct_a").await.unwrap(), 1, "{name}");
        assert!(store.get(&b).await.unwrap().is_some(), "{name}");
    }
}

// =============================================================================
// Turso persistence
// =============================================================================

#[tokio::test]
async fn test_turso_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("tally.db");
    let key = summary_key("acct_1");

    {
        let store = TursoCacheStore::open(&path, CachePolicy::default())
            .await
            .unwrap();
        store.set(&key, summary("acct_1", 3000.0)).await.unwrap();
    }

    let store = TursoCacheStore::open(&path, CachePolicy::default())
        .await
        .unwrap();
    assert_eq!(
        store.get(&key).await.unwrap(),
        Some(summary("acct_1", 3000.0))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_turso_concurrent_reads_and_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    let store = Arc::new(
        TursoCacheStore::open(&path, CachePolicy::default())
            .await
            .unwrap(),
    );
    let key = summary_key("acct_1");
    store.set(&key, summary("acct_1", 1.0)).await.unwrap();

    let reader = {
        let store = Arc::clone(&store);
        let key = key.clone();
        tokio::spawn(async move {
            let mut errors = 0;
            for _ in 0..500 {
                match store.entry(&key).await {
                    Ok(Some(_)) => {}
                    Ok(None) => panic!("entry vanished during an overwrite"),
                    Err(_) => errors += 1,
                }
            }
            errors
        })
    };

    let mut write_errors = 0;
    for i in 0..500 {
        let result = if i % 5 == 0 {
            store.mark_failed(&key, "source timed out").await
        } else {
            store.set(&key, summary("acct_1", i as f64)).await
        };
        if result.is_err() {
            write_errors += 1;
        }
    }

    let read_errors = reader.await.unwrap();
    assert_eq!((read_errors, write_errors), (0, 0));

    let entry = store.entry(&key).await.unwrap().unwrap();
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(entry.payload, Some(summary("acct_1", 499.0)));
}
