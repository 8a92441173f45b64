use super::entity::{ExecutionReport, OrderRequest};
use crate::store::error::StoreError;
use async_trait::async_trait;
use thiserror::Error;

/// # Summary
/// 交易执行环节中可能发生的错误。
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("交易所拒单: {0}")]
    ExchangeRejected(String),
    #[error("交易所通道网络错误: {0}")]
    Network(String),
    #[error("标的暂无最新报价: {0}")]
    NoQuote(String),
    #[error("标的 {0} 的交易锁已被占用")]
    LockHeld(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("内部系统错误: {0}")]
    InternalError(String),
}

/// # Summary
/// 交易所执行端口抽象。
/// 自动交易管线与手动下单接口通过此端口将标准化订单意图送往
/// 具体的执行通道（本地模拟撮合或 Kraken 真实下单）。
///
/// # Invariants
/// - 此接口必须是异步且线程安全的 (`Send + Sync`)。
/// - 实现者要么返回已成交的回报，要么返回错误，不存在长期挂起的委托。
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 提交一笔订单并等待成交回报
    ///
    /// # Arguments
    /// * `request` - 标准化的下单意图
    ///
    /// # Returns
    /// * `Ok(ExecutionReport)` - 成交回报
    /// * `Err(TradeError)` - 拒单、无报价或通道故障
    async fn place_order(&self, request: &OrderRequest) -> Result<ExecutionReport, TradeError>;
}
