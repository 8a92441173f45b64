use crate::instrument::InstrumentInner;
use async_trait::async_trait;
use dashmap::DashMap;
use soba_core::common::{Asset, AssetKind};
use soba_core::market::error::MarketError;
use soba_core::market::port::{Instrument, Market, MarketDataProvider};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// # Summary
/// Market 领域服务的具体实现类。
///
/// # Invariants
/// - 维护 Symbol 到 Instrument 聚合根弱引用的映射。
/// - 按资产类别将聚合根路由到对应的行情提供者。
/// - 内部持有清理通道以接收聚合根销毁信号。
pub struct MarketHub {
    // 股票通道行情驱动
    stock_provider: Arc<dyn MarketDataProvider>,
    // 加密货币通道行情驱动
    crypto_provider: Arc<dyn MarketDataProvider>,
    // 活跃聚合根注册表，Key 为 Symbol，Value 为弱引用
    instruments: DashMap<String, Weak<InstrumentInner>>,
    // 长期追踪集合，持有强引用使聚合根常驻
    pinned: DashMap<String, Arc<dyn Instrument>>,
    // 用于接收聚合根销毁信号的发送端
    cleanup_tx: mpsc::Sender<String>,
}

impl MarketHub {
    /// # Summary
    /// 初始化 Market 领域服务。
    ///
    /// # Logic
    /// 1. 创建 mpsc 通道用于资源清理。
    /// 2. 构造 MarketHub 实例并包装为 Arc。
    /// 3. 启动后台协程监听清理通道，根据接收到的 Symbol 移除注册表条目。
    ///
    /// # Arguments
    /// * `stock_provider`: 股票行情驱动。
    /// * `crypto_provider`: 加密货币行情驱动。
    ///
    /// # Returns
    /// 返回 MarketHub 的共享指针。
    pub fn new(
        stock_provider: Arc<dyn MarketDataProvider>,
        crypto_provider: Arc<dyn MarketDataProvider>,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel(100);
        let hub = Arc::new(Self {
            stock_provider,
            crypto_provider,
            instruments: DashMap::new(),
            pinned: DashMap::new(),
            cleanup_tx: tx,
        });

        let hub_weak = Arc::downgrade(&hub);
        tokio::spawn(async move {
            info!("Market cleanup monitor started");
            while let Some(symbol) = rx.recv().await {
                if let Some(h) = hub_weak.upgrade() {
                    debug!("Cleanup monitor: removing instrument {}", symbol);
                    h.instruments.remove(&symbol);
                }
            }
        });

        hub
    }

    fn provider_for(&self, kind: AssetKind) -> Arc<dyn MarketDataProvider> {
        match kind {
            AssetKind::Stock => self.stock_provider.clone(),
            AssetKind::Crypto => self.crypto_provider.clone(),
        }
    }

    /// 获取当前活跃的聚合根数量（仅供测试）。
    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.instruments.len()
    }
}

#[async_trait]
impl Market for MarketHub {
    /// # Summary
    /// 根据资产身份获取或创建一个聚合根实例。
    ///
    /// # Logic
    /// 1. 尝试从注册表中获取 Weak 引用。
    /// 2. 若 Weak 引用能成功 upgrade，说明聚合根活跃，直接返回其 Arc。
    /// 3. 否则，通过 InstrumentInner::create 构造新实例并启动后台抓取任务。
    /// 4. 将新实例的弱引用存入注册表并返回强引用。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    ///
    /// # Returns
    /// 成功返回 Instrument 聚合根（Arc 包装），失败返回 MarketError。
    async fn get_instrument(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        if let Some(weak) = self.instruments.get(&asset.symbol)
            && let Some(arc) = weak.upgrade()
        {
            return Ok(arc);
        }

        let provider = self.provider_for(asset.kind);
        let arc_instrument =
            InstrumentInner::create(asset.clone(), self.cleanup_tx.clone(), provider);

        self.instruments
            .insert(asset.symbol.clone(), Arc::downgrade(&arc_instrument));
        Ok(arc_instrument)
    }

    /// # Summary
    /// 长期追踪一个标的。
    ///
    /// # Logic
    /// 1. 获取或创建聚合根。
    /// 2. 把强引用登记到常驻集合，保证抓取任务不随调用方退出而消亡。
    async fn track(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        let instrument = self.get_instrument(asset).await?;
        self.pinned.insert(asset.symbol.clone(), instrument.clone());
        Ok(instrument)
    }

    /// 释放常驻强引用，聚合根在最后一个使用方退出后回收。
    fn untrack(&self, symbol: &str) {
        if self.pinned.remove(symbol).is_some() {
            debug!("Unpinned instrument {}", symbol);
        }
    }
}
