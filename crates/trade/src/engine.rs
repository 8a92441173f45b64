use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use soba_core::common::{Asset, AssetKind};
use soba_core::common::backoff::BackoffPolicy;
use soba_core::market::port::Market;
use soba_core::notify::port::Notifier;
use soba_core::store::port::{Holding, JournalStore, PortfolioStore};
use soba_core::trade::entity::{
    AutoTradePolicy, ExecutionReport, OrderRequest, OrderSide, TradeOrigin, TransactionRecord,
    TransactionStatus,
};
use soba_core::trade::port::{Exchange, TradeError};
use soba_store::retry::with_backoff;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::lock::TradeLockService;

/// # Summary
/// 单轮评估被跳过的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 全局自动交易开关关闭
    MasterOff,
    /// 标的没有策略行
    NoPolicy,
    /// 策略行存在但未启用
    Disabled,
    /// 策略未配置任何阈值，或价格未触及阈值
    NoThreshold,
    /// 聚合根尚无实时报价
    NoQuote,
    /// 已达到单日自动成交上限
    DailyCapReached,
    /// 交易锁被占用
    LockHeld,
}

/// # Summary
/// 单轮评估的结果。
#[derive(Debug)]
pub enum EvalOutcome {
    /// 触发并成交
    Executed(ExecutionReport),
    /// 本轮跳过
    Skipped(SkipReason),
}

/// # Summary
/// 自动交易引擎：策略评估调度器与执行管线的组合。
///
/// # Invariants
/// - 每个启用策略的标的对应一个 tokio 协程，通过 `AbortHandle` 管理生命周期。
/// - 执行管线的每次下单前必须持有交易锁，结束后必须释放。
/// - 流水与持仓写入以固定档位退避重试包裹。
pub struct TradeEngine {
    market: Arc<dyn Market>,
    exchange: Arc<dyn Exchange>,
    portfolio: Arc<dyn PortfolioStore>,
    journal: Arc<dyn JournalStore>,
    locks: TradeLockService,
    notifiers: Vec<Arc<dyn Notifier>>,
    backoff: BackoffPolicy,
    // 运行中的评估协程句柄，Key 为 symbol
    running: DashMap<String, AbortHandle>,
}

impl TradeEngine {
    pub fn new(
        market: Arc<dyn Market>,
        exchange: Arc<dyn Exchange>,
        portfolio: Arc<dyn PortfolioStore>,
        journal: Arc<dyn JournalStore>,
        locks: TradeLockService,
        notifiers: Vec<Arc<dyn Notifier>>,
        backoff: BackoffPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            market,
            exchange,
            portfolio,
            journal,
            locks,
            notifiers,
            backoff,
            running: DashMap::new(),
        })
    }

    /// # Summary
    /// 按当前设置与策略表启动全部评估协程。
    ///
    /// # Logic
    /// 1. 全局开关关闭时不启动任何协程。
    /// 2. 为每个启用的策略行启动一个按轮询间隔评估的协程。
    pub async fn start(self: &Arc<Self>) -> Result<(), TradeError> {
        let settings = self.portfolio.get_settings().await?;
        if !settings.auto_trade_enabled {
            info!("Auto trading is disabled globally, engine idle");
            return Ok(());
        }

        let policies = self.portfolio.list_policies().await?;
        for policy in policies.into_iter().filter(|p| p.enabled) {
            self.spawn_symbol_task(&policy.symbol, policy.kind, settings.poll_interval_secs);
        }
        Ok(())
    }

    /// # Summary
    /// 策略行变更后的协程生命周期调整。
    ///
    /// # Logic
    /// 1. 先停掉旧协程。
    /// 2. 策略与全局开关均启用时重新拉起。
    pub async fn apply_policy(self: &Arc<Self>, policy: &AutoTradePolicy) -> Result<(), TradeError> {
        self.stop_symbol(&policy.symbol);

        let settings = self.portfolio.get_settings().await?;
        if policy.enabled && settings.auto_trade_enabled {
            self.spawn_symbol_task(&policy.symbol, policy.kind, settings.poll_interval_secs);
        }
        Ok(())
    }

    /// 停止单个标的的评估协程。
    pub fn stop_symbol(&self, symbol: &str) {
        if let Some((_, handle)) = self.running.remove(symbol) {
            handle.abort();
            info!("Evaluation task for {} stopped", symbol);
        }
    }

    /// 停止全部评估协程。
    pub fn stop_all(&self) {
        let symbols: Vec<String> = self.running.iter().map(|e| e.key().clone()).collect();
        for symbol in symbols {
            self.stop_symbol(&symbol);
        }
    }

    fn spawn_symbol_task(self: &Arc<Self>, symbol: &str, kind: AssetKind, poll_secs: u64) {
        // 同名协程只保留最新的一个
        self.stop_symbol(symbol);

        let engine = self.clone();
        let symbol_owned = symbol.to_string();
        let handle = tokio::spawn(async move {
            // 常驻追踪该标的，保证评估期间聚合根持续接收行情
            let asset = Asset {
                symbol: symbol_owned.clone(),
                kind,
            };
            if let Err(e) = engine.market.track(&asset).await {
                error!("Failed to track {} for auto trading: {}", symbol_owned, e);
            }

            let mut interval = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
            // 首个 tick 立即返回，避免启动后空等一个周期
            loop {
                interval.tick().await;
                match engine.evaluate_symbol(&symbol_owned, kind).await {
                    Ok(EvalOutcome::Executed(report)) => {
                        info!(
                            "Auto trade executed: {} {} {} @ {}",
                            report.side, report.volume, report.symbol, report.price
                        );
                    }
                    Ok(EvalOutcome::Skipped(reason)) => {
                        debug!("Evaluation for {} skipped: {:?}", symbol_owned, reason);
                    }
                    Err(e) => {
                        // 单轮失败只记录，下一轮继续
                        error!("Evaluation for {} failed: {}", symbol_owned, e);
                    }
                }
            }
        });

        self.running
            .insert(symbol.to_string(), handle.abort_handle());
        info!("Evaluation task for {} started (interval {}s)", symbol, poll_secs);
    }

    /// # Summary
    /// 执行一轮策略评估。
    ///
    /// # Logic
    /// 1. 读取全局设置与策略行，任一未启用即跳过。
    /// 2. 读取实时报价并与阈值比对得出方向。
    /// 3. 校验单日自动成交上限。
    /// 4. 获取交易锁后进入执行管线，结束后释放。
    ///
    /// # Arguments
    /// * `symbol`: 交易标的。
    /// * `kind`: 资产类别。
    ///
    /// # Returns
    /// 成交回报或跳过原因。
    pub async fn evaluate_symbol(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<EvalOutcome, TradeError> {
        let settings = self.portfolio.get_settings().await?;
        if !settings.auto_trade_enabled {
            return Ok(EvalOutcome::Skipped(SkipReason::MasterOff));
        }

        let Some(policy) = self.portfolio.get_policy(symbol).await? else {
            return Ok(EvalOutcome::Skipped(SkipReason::NoPolicy));
        };
        if !policy.enabled {
            return Ok(EvalOutcome::Skipped(SkipReason::Disabled));
        }

        let asset = Asset {
            symbol: symbol.to_string(),
            kind,
        };
        let instrument = self
            .market
            .get_instrument(&asset)
            .await
            .map_err(|e| TradeError::InternalError(format!("无法获取行情: {}", e)))?;
        let Some(quote) = instrument.quote() else {
            return Ok(EvalOutcome::Skipped(SkipReason::NoQuote));
        };
        let price = Decimal::from_f64_retain(quote.price)
            .ok_or_else(|| TradeError::InternalError("市价非有效精度数值".into()))?;

        // 阈值比对：跌破买入阈值做多，突破卖出阈值减仓
        let (side, detail) = match (policy.buy_below, policy.sell_above) {
            (Some(t), _) if price <= t => (
                OrderSide::Buy,
                format!("price {} <= buy_below {}", price, t),
            ),
            (_, Some(t)) if price >= t => (
                OrderSide::Sell,
                format!("price {} >= sell_above {}", price, t),
            ),
            _ => return Ok(EvalOutcome::Skipped(SkipReason::NoThreshold)),
        };

        let now = Utc::now();
        let day_start = now
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        let today_count = self.journal.count_auto_trades_since(symbol, day_start).await?;
        if today_count >= policy.max_daily_trades {
            return Ok(EvalOutcome::Skipped(SkipReason::DailyCapReached));
        }

        if !self.locks.acquire(symbol, now).await? {
            return Ok(EvalOutcome::Skipped(SkipReason::LockHeld));
        }

        let volume = if policy.order_volume > Decimal::ZERO {
            policy.order_volume
        } else {
            settings.default_order_volume
        };
        let request = OrderRequest {
            symbol: symbol.to_string(),
            kind,
            side,
            volume,
            limit_price: None,
        };

        let result = self
            .execute_locked(&request, TradeOrigin::Auto, &detail, price)
            .await;

        if let Err(e) = self.locks.release(symbol).await {
            warn!("Failed to release trade lock for {}: {}", symbol, e);
        }

        result.map(EvalOutcome::Executed)
    }

    /// # Summary
    /// 手动下单入口（由 API 层调用）。
    ///
    /// # Logic
    /// 与自动管线共用执行路径，但不做阈值与日内限额评估，
    /// 仅以交易锁抑制与自动交易的并发冲突。
    pub async fn execute_manual(
        &self,
        request: &OrderRequest,
    ) -> Result<ExecutionReport, TradeError> {
        let now = Utc::now();
        if !self.locks.acquire(&request.symbol, now).await? {
            return Err(TradeError::LockHeld(request.symbol.clone()));
        }

        let reference = request.limit_price.unwrap_or(Decimal::ZERO);
        let result = self
            .execute_locked(request, TradeOrigin::Manual, "manual order", reference)
            .await;

        if let Err(e) = self.locks.release(&request.symbol).await {
            warn!("Failed to release trade lock for {}: {}", request.symbol, e);
        }

        result
    }

    /// # Summary
    /// 持锁执行：下单、落流水、调持仓、发通知。
    ///
    /// # Logic
    /// 1. 通过交易所端口下单。
    /// 2. 成交后以退避重试落 filled 流水并调整持仓。
    /// 3. 下单失败时落 failed 流水（best-effort）并上抛错误。
    /// 4. 通知失败只告警，不影响结果。
    async fn execute_locked(
        &self,
        request: &OrderRequest,
        origin: TradeOrigin,
        detail: &str,
        reference_price: Decimal,
    ) -> Result<ExecutionReport, TradeError> {
        match self.exchange.place_order(request).await {
            Ok(report) => {
                self.journal_record(
                    &report.symbol,
                    report.side,
                    report.volume,
                    report.price,
                    TransactionStatus::Filled,
                    origin,
                    detail,
                    report.executed_at,
                )
                .await?;
                self.apply_fill_to_holding(request.kind, &report).await?;
                self.notify_fill(&report, origin).await;
                Ok(report)
            }
            Err(e) => {
                // 失败流水尽力而为：记录失败本身不该掩盖下单错误
                if let Err(journal_err) = self
                    .journal_record(
                        &request.symbol,
                        request.side,
                        request.volume,
                        reference_price,
                        TransactionStatus::Failed,
                        origin,
                        &format!("{} ({})", detail, e),
                        Utc::now(),
                    )
                    .await
                {
                    warn!("Failed to journal rejected order: {}", journal_err);
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn journal_record(
        &self,
        symbol: &str,
        side: OrderSide,
        volume: Decimal,
        price: Decimal,
        status: TransactionStatus,
        origin: TradeOrigin,
        detail: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TradeError> {
        let record = TransactionRecord {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            volume,
            price,
            status,
            origin,
            detail: detail.to_string(),
            created_at: at,
        };

        with_backoff(self.backoff, "journal.append_transaction", || {
            let journal = self.journal.clone();
            let record = record.clone();
            async move { journal.append_transaction(&record).await }
        })
        .await?;
        Ok(())
    }

    /// 将成交回报摊入持仓（平均成本法），不存在的持仓行按空仓初始化。
    async fn apply_fill_to_holding(
        &self,
        kind: AssetKind,
        report: &ExecutionReport,
    ) -> Result<(), TradeError> {
        let mut holding = self
            .portfolio
            .get_holding(&report.symbol)
            .await?
            .unwrap_or_else(|| Holding::empty(report.symbol.clone(), kind));

        holding.apply_fill(report.side, report.volume, report.price, report.executed_at);

        with_backoff(self.backoff, "portfolio.upsert_holding", || {
            let portfolio = self.portfolio.clone();
            let holding = holding.clone();
            async move { portfolio.upsert_holding(&holding).await }
        })
        .await?;
        Ok(())
    }

    async fn notify_fill(&self, report: &ExecutionReport, origin: TradeOrigin) {
        let subject = format!("Trade filled: {}", report.symbol);
        let content = format!(
            "{} {} {} @ {} ({}, ref {})",
            report.side, report.volume, report.symbol, report.price, origin, report.order_ref
        );
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&subject, &content).await {
                warn!("Trade notification failed: {}", e);
            }
        }
    }
}
