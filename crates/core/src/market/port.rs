use crate::common::Asset;
use crate::market::entity::{Candle, Quote, Tick};
use crate::market::error::MarketError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// # Summary
/// 实时成交流别名，使用动态分发的异步流。
pub type TickStream = Pin<Box<dyn Stream<Item = Tick> + Send>>;

/// # Summary
/// 聚合根运行状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentStatus {
    Initializing,
    Online,
    Offline,
    Faulted,
}

/// # Summary
/// Instrument 聚合根行为契约，对应一个被实时追踪的标的。
///
/// # Invariants
/// - 身份标识 (Asset) 在聚合根生命周期内保持不变。
/// - 同一标的的实时流必须是单源广播的。
#[async_trait]
pub trait Instrument: Send + Sync {
    /// 获取该聚合根的资产身份。
    fn identity(&self) -> &Asset;

    /// # Summary
    /// 获取当前最新报价快照。
    ///
    /// # Logic
    /// 1. 从内存中的最新状态快照中读取成交价与时间。
    ///
    /// # Returns
    /// 若已收到过行情则返回快照，否则返回 None。
    fn quote(&self) -> Option<Quote>;

    /// # Summary
    /// 获取按时间升序排列的近期收盘价窗口。
    ///
    /// # Logic
    /// 1. 读取滚动缓冲区中的历史收盘价。
    /// 2. 最多返回 `limit` 个，取最近的一段。
    ///
    /// # Arguments
    /// * `limit`: 需要的数据点上限。
    ///
    /// # Returns
    /// 收盘价列表，可能少于 `limit`。
    fn recent_closes(&self, limit: usize) -> Vec<f64>;

    /// # Summary
    /// 订阅该标的的实时成交流。
    ///
    /// # Logic
    /// 1. 挂载到聚合根内部的广播器。
    /// 2. 持续接收并产出最新的成交事件。
    ///
    /// # Returns
    /// 返回异步流 TickStream。
    fn subscribe(&self) -> TickStream;

    /// 获取聚合根当前的运行状态。
    fn status(&self) -> InstrumentStatus;
}

/// # Summary
/// 市场行情数据提供者接口（原始数据源）。
///
/// # Invariants
/// - 实现者必须保证 subscribe_ticks 在长连接中断后具备自愈能力。
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// # Summary
    /// 获取特定标的的历史 K 线数据。
    ///
    /// # Logic
    /// 1. 构建数据源 REST 请求。
    /// 2. 执行网络请求并解析响应数据。
    /// 3. 按时间升序返回最近 `limit` 根。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    /// * `limit`: K 线数量上限。
    ///
    /// # Returns
    /// 成功返回 K 线列表。
    async fn fetch_history(&self, asset: &Asset, limit: usize) -> Result<Vec<Candle>, MarketError>;

    /// # Summary
    /// 订阅实时成交流。
    ///
    /// # Logic
    /// 1. 建立 WebSocket 长连接并发送订阅报文。
    /// 2. 持续解析推送帧并产出 Tick 推入流中。
    /// 3. 连接断开后自动退避重连。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    ///
    /// # Returns
    /// 成功返回异步流。
    async fn subscribe_ticks(&self, asset: &Asset) -> Result<TickStream, MarketError>;
}

/// # Summary
/// Market 领域服务契约（工厂与注册表）。
///
/// # Invariants
/// - 必须维持 Symbol 到物理聚合根的唯一映射。
/// - 负责聚合根在零引用时的资源回收。
#[async_trait]
pub trait Market: Send + Sync {
    /// # Summary
    /// 根据资产身份获取或创建一个 Instrument 聚合根。
    ///
    /// # Logic
    /// 1. 在活跃注册表中查找对应 Symbol。
    /// 2. 若存在且有效，返回其强引用。
    /// 3. 若不存在，初始化新的聚合根并启动抓取任务，存入注册表。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    ///
    /// # Returns
    /// 成功返回 Instrument 聚合根。
    async fn get_instrument(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError>;

    /// # Summary
    /// 长期追踪一个标的：注册表额外持有聚合根的强引用，
    /// 使其在没有其它使用方时也持续接收行情。
    ///
    /// # Logic
    /// 1. 获取或创建聚合根。
    /// 2. 将强引用登记到常驻集合，重复调用幂等。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    ///
    /// # Returns
    /// 成功返回 Instrument 聚合根。
    async fn track(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError>;

    /// # Summary
    /// 停止长期追踪，释放常驻强引用。
    ///
    /// # Logic
    /// 仅移除常驻引用；若仍有其它使用方持有聚合根，行情不中断。
    fn untrack(&self, symbol: &str);
}
