use crate::buffer::RollingBuffer;
use async_trait::async_trait;
use soba_cache::mem::MemCache;
use soba_core::cache::port::CacheExt;
use soba_core::common::Asset;
use soba_core::market::entity::{Quote, Tick};
use soba_core::market::port::{Instrument, InstrumentStatus, MarketDataProvider, TickStream};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// 滚动收盘价窗口容量
const HISTORY_CAPACITY: usize = 200;

/// # Summary
/// Instrument 聚合根的具体实现结构。
///
/// # Invariants
/// - 报价快照与历史窗口完全托管于独占的 MemCache 实例中。
/// - 只有广播通道句柄与状态标记维护在内存 Mutex 中。
pub(crate) struct InstrumentInner {
    // 资产身份信息
    identity: Asset,
    // 实时广播通道（无法序列化，保留在内存中）
    channel: broadcast::Sender<Tick>,
    // 独占内存缓存实例
    cache: MemCache,
    // 运行状态标记
    status: Mutex<InstrumentStatus>,
    // 用于通知清理注册表的通道
    cleanup_tx: mpsc::Sender<String>,
}

impl InstrumentInner {
    /// # Summary
    /// 创建并初始化聚合根。
    ///
    /// # Logic
    /// 1. 构造 InstrumentInner 实例并注入独占 Cache。
    /// 2. 启动后台抓取协程：先回填历史，再订阅实时流。
    ///
    /// # Arguments
    /// * `identity`: 资产身份。
    /// * `cleanup_tx`: 清理通道。
    /// * `provider`: 数据源驱动。
    ///
    /// # Returns
    /// 返回聚合根实例的强引用 Arc。
    pub fn create(
        identity: Asset,
        cleanup_tx: mpsc::Sender<String>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Arc<Self> {
        let (tx, _) = broadcast::channel(128);
        let instrument = Arc::new(Self {
            identity: identity.clone(),
            channel: tx,
            cache: MemCache::new(),
            status: Mutex::new(InstrumentStatus::Initializing),
            cleanup_tx,
        });

        let fetcher = InstrumentFetcher {
            identity,
            inner: Arc::downgrade(&instrument),
            provider,
        };
        tokio::spawn(fetcher.run());

        instrument
    }

    fn set_status(&self, status: InstrumentStatus) {
        let mut guard = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *guard = status;
    }

    /// # Summary
    /// 更新内部状态并触发广播分发。
    ///
    /// # Logic
    /// 1. 更新缓存中的报价快照 ("q")。
    /// 2. 将收盘价推入滚动窗口 ("h")。
    /// 3. 向广播通道分发原始 Tick。
    pub async fn update_and_broadcast(&self, tick: Tick) {
        let quote = Quote {
            symbol: tick.symbol.clone(),
            price: tick.price,
            updated_at: tick.time,
        };
        let _ = self.cache.set("q", &quote).await;

        let mut buffer = self
            .cache
            .get::<RollingBuffer<f64>>("h")
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| RollingBuffer::new(HISTORY_CAPACITY));
        buffer.push(tick.price);
        let _ = self.cache.set("h", &buffer).await;

        let _ = self.channel.send(tick);
    }

    /// 历史回填：将 REST 拉到的收盘价灌入滚动窗口。
    pub async fn seed_history(&self, closes: &[f64]) {
        let mut buffer = RollingBuffer::new(HISTORY_CAPACITY);
        for &c in closes {
            buffer.push(c);
        }
        let _ = self.cache.set("h", &buffer).await;
    }
}

impl Drop for InstrumentInner {
    /// 析构时发送清理信号，注册表据此移除对应条目。
    fn drop(&mut self) {
        let _ = self.cleanup_tx.try_send(self.identity.symbol.clone());
    }
}

#[async_trait]
impl Instrument for InstrumentInner {
    fn identity(&self) -> &Asset {
        &self.identity
    }

    /// # Summary
    /// 获取最新报价快照。
    ///
    /// # Logic
    /// 从缓存读取 "q" 对应的值。
    fn quote(&self) -> Option<Quote> {
        futures::executor::block_on(async { self.cache.get::<Quote>("q").await.ok().flatten() })
    }

    /// # Summary
    /// 获取近期收盘价窗口。
    ///
    /// # Logic
    /// 1. 从缓存读取滚动缓冲区 "h"。
    /// 2. 展开为有序 Vec 后截取最近 `limit` 个。
    fn recent_closes(&self, limit: usize) -> Vec<f64> {
        let mut closes = futures::executor::block_on(async {
            self.cache
                .get::<RollingBuffer<f64>>("h")
                .await
                .ok()
                .flatten()
                .map(|b| b.to_vec())
                .unwrap_or_default()
        });
        if closes.len() > limit {
            closes.drain(..closes.len() - limit);
        }
        closes
    }

    /// # Summary
    /// 订阅实时成交流。
    ///
    /// # Logic
    /// 从广播通道派生接收端并包装为异步流。
    fn subscribe(&self) -> TickStream {
        let rx = self.channel.subscribe();
        let stream = async_stream::stream! {
            let mut rx = rx;
            while let Ok(tick) = rx.recv().await {
                yield tick;
            }
        };

        Box::pin(stream)
    }

    fn status(&self) -> InstrumentStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// # Summary
/// 抓取任务后台逻辑执行器。
///
/// # Invariants
/// - 仅持有聚合根的弱引用，聚合根销毁后任务自行退出。
struct InstrumentFetcher {
    identity: Asset,
    inner: Weak<InstrumentInner>,
    provider: Arc<dyn MarketDataProvider>,
}

impl InstrumentFetcher {
    /// # Summary
    /// 启动抓取协程。
    ///
    /// # Logic
    /// 1. 先通过 REST 回填历史收盘价窗口。
    /// 2. 订阅原始实时流并逐笔分发至聚合根更新。
    /// 3. 聚合根被释放后停止消费并退出。
    async fn run(self) {
        info!("Fetcher for {} started", self.identity.symbol);

        match self.provider.fetch_history(&self.identity, HISTORY_CAPACITY).await {
            Ok(candles) => {
                if let Some(inner) = self.inner.upgrade() {
                    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                    inner.seed_history(&closes).await;
                }
            }
            Err(e) => {
                warn!("History backfill for {} failed: {}", self.identity.symbol, e);
            }
        }

        match self.provider.subscribe_ticks(&self.identity).await {
            Ok(mut stream) => {
                if let Some(inner) = self.inner.upgrade() {
                    inner.set_status(InstrumentStatus::Online);
                }
                while let Some(tick) = futures::StreamExt::next(&mut stream).await {
                    if let Some(inner) = self.inner.upgrade() {
                        inner.update_and_broadcast(tick).await;
                    } else {
                        break;
                    }
                }
                if let Some(inner) = self.inner.upgrade() {
                    inner.set_status(InstrumentStatus::Offline);
                }
            }
            Err(e) => {
                warn!("Subscription for {} failed: {}", self.identity.symbol, e);
                if let Some(inner) = self.inner.upgrade() {
                    inner.set_status(InstrumentStatus::Faulted);
                }
            }
        }
    }
}
