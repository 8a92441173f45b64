use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use soba_core::common::Asset;
use soba_core::market::port::Market;
use soba_core::trade::entity::{ExecutionReport, OrderRequest};
use soba_core::trade::port::{Exchange, TradeError};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// # Summary
/// 本地模拟成交通道：以当前市场报价立即全额成交。
///
/// # Invariants
/// - 市价单按聚合根最新报价成交，限价单直接按限价成交。
/// - 手续费 = 成交额 * 费率。
pub struct PaperExchange {
    market: Arc<dyn Market>,
    commission_rate: Decimal,
}

impl PaperExchange {
    pub fn new(market: Arc<dyn Market>, commission_rate: Decimal) -> Self {
        Self {
            market,
            commission_rate,
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    /// # Summary
    /// 模拟撮合一笔订单。
    ///
    /// # Logic
    /// 1. 从 Market 聚合根读取最新报价作为成交基准。
    /// 2. 若是停牌或尚无报价，直接拒绝。
    /// 3. 生成本地回执号并按费率计提手续费。
    ///
    /// # Arguments
    /// * `request` - 标准化下单意图。
    ///
    /// # Returns
    /// 立即全额成交的回报。
    async fn place_order(&self, request: &OrderRequest) -> Result<ExecutionReport, TradeError> {
        let asset = Asset {
            symbol: request.symbol.clone(),
            kind: request.kind,
        };
        let instrument = self
            .market
            .get_instrument(&asset)
            .await
            .map_err(|e| TradeError::InternalError(format!("无法获取行情: {}", e)))?;

        let price = match request.limit_price {
            Some(p) => p,
            None => {
                let quote = instrument
                    .quote()
                    .ok_or_else(|| TradeError::NoQuote(request.symbol.clone()))?;
                Decimal::from_f64_retain(quote.price)
                    .ok_or_else(|| TradeError::InternalError("市价非有效精度数值".into()))?
            }
        };

        let commission = price * request.volume * self.commission_rate;
        let order_ref = format!("paper-{}", Uuid::new_v4());

        info!(
            "Paper fill: {} {} {} @ {} (fee {})",
            request.side, request.volume, request.symbol, price, commission
        );

        Ok(ExecutionReport {
            order_ref,
            symbol: request.symbol.clone(),
            side: request.side,
            price,
            volume: request.volume,
            commission,
            executed_at: Utc::now(),
        })
    }
}
