use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use soba_core::analysis::entity::{Signal, TechnicalReport};
use soba_core::common::AssetKind;
use soba_core::store::port::{
    Holding, JournalStore, LockStore, PortfolioStore, Settings, SystemStore,
};
use soba_core::trade::entity::{
    AutoTradePolicy, OrderSide, TradeOrigin, TransactionRecord, TransactionStatus,
};
use soba_store::journal::SqliteJournalStore;
use soba_store::lock::SqliteLockStore;
use soba_store::portfolio::SqlitePortfolioStore;
use soba_store::system::SqliteSystemStore;

#[tokio::test]
async fn test_holding_crud_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePortfolioStore::open(dir.path()).await.unwrap();

    let holding = Holding {
        symbol: "AAPL".to_string(),
        kind: AssetKind::Stock,
        quantity: dec!(12.5),
        avg_price: dec!(187.3),
        last_updated: Utc::now(),
    };
    store.upsert_holding(&holding).await.unwrap();

    let crypto = Holding {
        symbol: "BTC/USD".to_string(),
        kind: AssetKind::Crypto,
        quantity: dec!(0.5),
        avg_price: dec!(64000),
        last_updated: Utc::now(),
    };
    store.upsert_holding(&crypto).await.unwrap();

    // 按类别过滤
    let stocks = store.list_holdings(Some(AssetKind::Stock)).await.unwrap();
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0].symbol, "AAPL");
    assert_eq!(stocks[0].quantity, dec!(12.5));

    let all = store.list_holdings(None).await.unwrap();
    assert_eq!(all.len(), 2);

    // Upsert 覆盖
    let mut updated = holding.clone();
    updated.quantity = dec!(20);
    store.upsert_holding(&updated).await.unwrap();
    let fetched = store.get_holding("AAPL").await.unwrap().unwrap();
    assert_eq!(fetched.quantity, dec!(20));

    store.remove_holding("AAPL").await.unwrap();
    assert!(store.get_holding("AAPL").await.unwrap().is_none());
}

#[tokio::test]
async fn test_settings_default_then_saved() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePortfolioStore::open(dir.path()).await.unwrap();

    // 未写入时返回默认值
    let settings = store.get_settings().await.unwrap();
    assert!(!settings.auto_trade_enabled);
    assert_eq!(settings.poll_interval_secs, 30);

    let new_settings = Settings {
        auto_trade_enabled: true,
        poll_interval_secs: 10,
        default_order_volume: dec!(2),
    };
    store.save_settings(&new_settings).await.unwrap();

    let fetched = store.get_settings().await.unwrap();
    assert!(fetched.auto_trade_enabled);
    assert_eq!(fetched.poll_interval_secs, 10);
    assert_eq!(fetched.default_order_volume, dec!(2));
}

#[tokio::test]
async fn test_policy_upsert_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePortfolioStore::open(dir.path()).await.unwrap();

    let policy = AutoTradePolicy {
        symbol: "ETH/USD".to_string(),
        kind: AssetKind::Crypto,
        enabled: true,
        buy_below: Some(dec!(3000)),
        sell_above: None,
        order_volume: dec!(0.1),
        max_daily_trades: 3,
        updated_at: Utc::now(),
    };
    store.save_policy(&policy).await.unwrap();

    let fetched = store.get_policy("ETH/USD").await.unwrap().unwrap();
    assert_eq!(fetched.buy_below, Some(dec!(3000)));
    assert_eq!(fetched.sell_above, None);
    assert_eq!(fetched.max_daily_trades, 3);

    let listed = store.list_policies().await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_journal_append_and_daily_count() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJournalStore::open(dir.path()).await.unwrap();
    let now = Utc::now();

    for (i, origin) in [TradeOrigin::Auto, TradeOrigin::Auto, TradeOrigin::Manual]
        .iter()
        .enumerate()
    {
        let record = TransactionRecord {
            id: format!("tx-{}", i),
            symbol: "BTC/USD".to_string(),
            side: OrderSide::Buy,
            volume: dec!(0.1),
            price: dec!(64000),
            status: TransactionStatus::Filled,
            origin: *origin,
            detail: "threshold crossed".to_string(),
            created_at: now,
        };
        store.append_transaction(&record).await.unwrap();
    }

    // 失败流水不计入日内限额
    let failed = TransactionRecord {
        id: "tx-failed".to_string(),
        symbol: "BTC/USD".to_string(),
        side: OrderSide::Sell,
        volume: dec!(0.1),
        price: dec!(64000),
        status: TransactionStatus::Failed,
        origin: TradeOrigin::Auto,
        detail: "rejected".to_string(),
        created_at: now,
    };
    store.append_transaction(&failed).await.unwrap();

    let listed = store.list_transactions(10).await.unwrap();
    assert_eq!(listed.len(), 4);

    let count = store
        .count_auto_trades_since("BTC/USD", now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(count, 2);

    // 窗口外的流水不计入
    let count_future = store
        .count_auto_trades_since("BTC/USD", now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(count_future, 0);
}

#[tokio::test]
async fn test_report_upsert_keeps_latest() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteJournalStore::open(dir.path()).await.unwrap();

    let mut report = TechnicalReport {
        symbol: "AAPL".to_string(),
        sma: Some(185.0),
        ema: Some(186.1),
        rsi: 55.0,
        boll_upper: Some(190.0),
        boll_middle: Some(185.0),
        boll_lower: Some(180.0),
        fib_levels: vec![180.0, 184.72, 187.64, 190.0],
        signal: Signal::Hold,
        sample_size: 200,
        computed_at: Utc::now(),
    };
    store.save_report(&report).await.unwrap();

    report.rsi = 72.0;
    report.signal = Signal::Sell;
    store.save_report(&report).await.unwrap();

    let fetched = store.latest_report("AAPL").await.unwrap().unwrap();
    assert_eq!(fetched.rsi, 72.0);
    assert_eq!(fetched.signal, Signal::Sell);
    assert_eq!(fetched.fib_levels.len(), 4);
    assert!(store.latest_report("MSFT").await.unwrap().is_none());
}

#[tokio::test]
async fn test_lock_acquire_conflict_and_stale_reclaim() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteLockStore::open(dir.path()).await.unwrap();
    let ttl = Duration::minutes(5);
    let now = Utc::now();

    // 首次获取成功
    assert!(store.try_acquire("BTC/USD", "worker-a", now, ttl).await.unwrap());
    // 未过期期间他人获取失败
    assert!(
        !store
            .try_acquire("BTC/USD", "worker-b", now + Duration::minutes(1), ttl)
            .await
            .unwrap()
    );
    // 其它 symbol 不受影响
    assert!(store.try_acquire("ETH/USD", "worker-b", now, ttl).await.unwrap());

    // 超过 5 分钟后允许抢占
    assert!(
        store
            .try_acquire("BTC/USD", "worker-b", now + Duration::minutes(6), ttl)
            .await
            .unwrap()
    );

    // 释放仅对持有者生效
    store.release("BTC/USD", "worker-a").await.unwrap();
    assert!(
        !store
            .try_acquire("BTC/USD", "worker-c", now + Duration::minutes(6), ttl)
            .await
            .unwrap()
    );
    store.release("BTC/USD", "worker-b").await.unwrap();
    assert!(
        store
            .try_acquire("BTC/USD", "worker-c", now + Duration::minutes(6), ttl)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_user_seed_and_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSystemStore::open(dir.path()).await.unwrap();

    // 首次播种创建 admin，第二次为幂等
    assert!(store.ensure_default_admin().await.unwrap());
    assert!(!store.ensure_default_admin().await.unwrap());

    let admin = store.get_user("admin").await.unwrap().unwrap();
    assert!(admin.force_password_change);
    assert!(bcrypt::verify("admin123", &admin.password_hash).unwrap());

    assert!(store.get_user("nobody").await.unwrap().is_none());
}
