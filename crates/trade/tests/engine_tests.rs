use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use soba_core::common::{Asset, AssetKind};
use soba_core::common::backoff::BackoffPolicy;
use soba_core::market::entity::Quote;
use soba_core::market::error::MarketError;
use soba_core::market::port::{Instrument, InstrumentStatus, Market, TickStream};
use soba_core::notify::error::NotifyError;
use soba_core::notify::port::Notifier;
use soba_core::store::port::{JournalStore, LockStore, PortfolioStore, Settings};
use soba_core::trade::entity::{
    AutoTradePolicy, OrderRequest, OrderSide, TradeOrigin, TransactionStatus,
};
use soba_store::journal::SqliteJournalStore;
use soba_store::lock::SqliteLockStore;
use soba_store::portfolio::SqlitePortfolioStore;
use soba_trade::engine::{EvalOutcome, SkipReason, TradeEngine};
use soba_trade::lock::TradeLockService;
use soba_trade::paper::PaperExchange;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 固定报价的行情桩
struct FixedInstrument {
    identity: Asset,
    price: f64,
}

#[async_trait]
impl Instrument for FixedInstrument {
    fn identity(&self) -> &Asset {
        &self.identity
    }
    fn quote(&self) -> Option<Quote> {
        Some(Quote {
            symbol: self.identity.symbol.clone(),
            price: self.price,
            updated_at: Utc::now(),
        })
    }
    fn recent_closes(&self, _limit: usize) -> Vec<f64> {
        vec![]
    }
    fn subscribe(&self) -> TickStream {
        unimplemented!()
    }
    fn status(&self) -> InstrumentStatus {
        InstrumentStatus::Online
    }
}

struct FixedMarket {
    price: f64,
}

#[async_trait]
impl Market for FixedMarket {
    async fn get_instrument(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        Ok(Arc::new(FixedInstrument {
            identity: asset.clone(),
            price: self.price,
        }))
    }

    async fn track(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        self.get_instrument(asset).await
    }

    fn untrack(&self, _symbol: &str) {}
}

struct CountingNotifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _subject: &str, _content: &str) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    engine: Arc<TradeEngine>,
    portfolio: Arc<SqlitePortfolioStore>,
    journal: Arc<SqliteJournalStore>,
    lock_store: Arc<SqliteLockStore>,
    notifier: Arc<CountingNotifier>,
    _dir: tempfile::TempDir,
}

/// 在临时目录上搭建一套真实存储加固定报价的引擎
async fn build_harness(price: f64) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let portfolio = Arc::new(
        SqlitePortfolioStore::open(dir.path()).await.expect("portfolio store"),
    );
    let journal = Arc::new(SqliteJournalStore::open(dir.path()).await.expect("journal store"));
    let lock_store = Arc::new(SqliteLockStore::open(dir.path()).await.expect("lock store"));
    let market: Arc<dyn Market> = Arc::new(FixedMarket { price });
    let exchange = Arc::new(PaperExchange::new(market.clone(), dec!(0.001)));
    let notifier = Arc::new(CountingNotifier {
        calls: AtomicUsize::new(0),
    });

    // 测试用退避：失败路径不必等待真实的秒级间隔
    let backoff = BackoffPolicy::new(Duration::from_millis(1), 1);
    let engine = TradeEngine::new(
        market,
        exchange,
        portfolio.clone(),
        journal.clone(),
        TradeLockService::new(lock_store.clone(), "engine-test"),
        vec![notifier.clone()],
        backoff,
    );

    Harness {
        engine,
        portfolio,
        journal,
        lock_store,
        notifier,
        _dir: dir,
    }
}

async fn enable_auto_trading(h: &Harness) {
    h.portfolio
        .save_settings(&Settings {
            auto_trade_enabled: true,
            poll_interval_secs: 1,
            default_order_volume: dec!(1),
        })
        .await
        .expect("save settings");
}

fn policy(symbol: &str, buy_below: Option<Decimal>, sell_above: Option<Decimal>) -> AutoTradePolicy {
    AutoTradePolicy {
        symbol: symbol.to_string(),
        kind: AssetKind::Crypto,
        enabled: true,
        buy_below,
        sell_above,
        order_volume: dec!(0.5),
        max_daily_trades: 10,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_buy_triggers_at_threshold() {
    let h = build_harness(30000.0).await;
    enable_auto_trading(&h).await;
    h.portfolio
        .save_policy(&policy("BTC/USD", Some(dec!(30000)), None))
        .await
        .unwrap();

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    let EvalOutcome::Executed(report) = outcome else {
        panic!("expected execution, got {:?}", outcome);
    };
    assert_eq!(report.side, OrderSide::Buy);
    assert_eq!(report.volume, dec!(0.5));
    assert_eq!(report.price, dec!(30000));

    // 流水、持仓、通知与锁释放全部到位
    let txs = h.journal.list_transactions(10).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].origin, TradeOrigin::Auto);
    assert_eq!(txs[0].status, TransactionStatus::Filled);

    let holding = h.portfolio.get_holding("BTC/USD").await.unwrap().unwrap();
    assert_eq!(holding.quantity, dec!(0.5));
    assert_eq!(holding.avg_price, dec!(30000));

    assert_eq!(h.notifier.calls.load(Ordering::SeqCst), 1);
    assert!(
        h.lock_store
            .try_acquire("BTC/USD", "probe", Utc::now(), chrono::Duration::minutes(5))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_no_trigger_between_thresholds() {
    let h = build_harness(30000.0).await;
    enable_auto_trading(&h).await;
    h.portfolio
        .save_policy(&policy("BTC/USD", Some(dec!(29000)), Some(dec!(31000))))
        .await
        .unwrap();

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        EvalOutcome::Skipped(SkipReason::NoThreshold)
    ));
    assert!(h.journal.list_transactions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sell_reduces_existing_holding() {
    let h = build_harness(32000.0).await;
    enable_auto_trading(&h).await;
    h.portfolio
        .save_policy(&policy("BTC/USD", None, Some(dec!(31000))))
        .await
        .unwrap();

    let mut seed = soba_core::store::port::Holding::empty("BTC/USD", AssetKind::Crypto);
    seed.apply_fill(OrderSide::Buy, dec!(2), dec!(28000), Utc::now());
    h.portfolio.upsert_holding(&seed).await.unwrap();

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(outcome, EvalOutcome::Executed(_)));

    let holding = h.portfolio.get_holding("BTC/USD").await.unwrap().unwrap();
    assert_eq!(holding.quantity, dec!(1.5));
    // 卖出不改变平均成本
    assert_eq!(holding.avg_price, dec!(28000));
}

#[tokio::test]
async fn test_master_switch_off_skips() {
    let h = build_harness(30000.0).await;
    // 未写入设置 → 默认关闭
    h.portfolio
        .save_policy(&policy("BTC/USD", Some(dec!(30000)), None))
        .await
        .unwrap();

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(outcome, EvalOutcome::Skipped(SkipReason::MasterOff)));
}

#[tokio::test]
async fn test_disabled_policy_skips() {
    let h = build_harness(30000.0).await;
    enable_auto_trading(&h).await;
    let mut p = policy("BTC/USD", Some(dec!(30000)), None);
    p.enabled = false;
    h.portfolio.save_policy(&p).await.unwrap();

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(outcome, EvalOutcome::Skipped(SkipReason::Disabled)));
}

#[tokio::test]
async fn test_daily_cap_suppresses_second_trade() {
    let h = build_harness(30000.0).await;
    enable_auto_trading(&h).await;
    let mut p = policy("BTC/USD", Some(dec!(30000)), None);
    p.max_daily_trades = 1;
    h.portfolio.save_policy(&p).await.unwrap();

    let first = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(first, EvalOutcome::Executed(_)));

    let second = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(
        second,
        EvalOutcome::Skipped(SkipReason::DailyCapReached)
    ));
}

#[tokio::test]
async fn test_foreign_lock_blocks_execution() {
    let h = build_harness(30000.0).await;
    enable_auto_trading(&h).await;
    h.portfolio
        .save_policy(&policy("BTC/USD", Some(dec!(30000)), None))
        .await
        .unwrap();

    // 模拟另一个进程已持有数据库锁行
    assert!(
        h.lock_store
            .try_acquire("BTC/USD", "other-process", Utc::now(), chrono::Duration::minutes(5))
            .await
            .unwrap()
    );

    let outcome = h
        .engine
        .evaluate_symbol("BTC/USD", AssetKind::Crypto)
        .await
        .unwrap();
    assert!(matches!(outcome, EvalOutcome::Skipped(SkipReason::LockHeld)));
    assert!(h.journal.list_transactions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_execution_journals_manual_origin() {
    let h = build_harness(64000.0).await;

    let request = OrderRequest {
        symbol: "BTC/USD".to_string(),
        kind: AssetKind::Crypto,
        side: OrderSide::Buy,
        volume: dec!(0.1),
        limit_price: None,
    };
    let report = h.engine.execute_manual(&request).await.unwrap();
    assert_eq!(report.price, dec!(64000));

    let txs = h.journal.list_transactions(10).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].origin, TradeOrigin::Manual);

    let holding = h.portfolio.get_holding("BTC/USD").await.unwrap().unwrap();
    assert_eq!(holding.quantity, dec!(0.1));
}
