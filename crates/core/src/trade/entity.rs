use crate::common::AssetKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// # Summary
/// 订单的交易方向定义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// 买入
    Buy,
    /// 卖出
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(format!("Unknown OrderSide: {}", s)),
        }
    }
}

/// # Summary
/// 标准化的下单意图。这是交易管线向交易所端口发送的唯一请求形态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 交易标的
    pub symbol: String,
    /// 资产类别 (决定路由到哪个交易所通道)
    pub kind: AssetKind,
    /// 买卖方向
    pub side: OrderSide,
    /// 委托数量（绝对值）
    pub volume: Decimal,
    /// 限价。None 表示按市价成交。
    pub limit_price: Option<Decimal>,
}

/// # Summary
/// 交易所成交回报。用于精确记录资金变动与持仓调整。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// 交易所侧的订单引用 (txid 或本地生成的回执号)
    pub order_ref: String,
    /// 交易标的
    pub symbol: String,
    /// 成交方向
    pub side: OrderSide,
    /// 实际成交价格
    pub price: Decimal,
    /// 实际成交数量
    pub volume: Decimal,
    /// 手续费
    pub commission: Decimal,
    /// 成交时间
    pub executed_at: DateTime<Utc>,
}

/// # Summary
/// 交易来源，标记一笔流水是自动规则触发还是用户手动发起。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TradeOrigin {
    Auto,
    Manual,
}

impl std::fmt::Display for TradeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOrigin::Auto => write!(f, "auto"),
            TradeOrigin::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for TradeOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(TradeOrigin::Auto),
            "manual" => Ok(TradeOrigin::Manual),
            _ => Err(format!("Unknown TradeOrigin: {}", s)),
        }
    }
}

/// # Summary
/// 流水状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 已成交
    Filled,
    /// 执行失败 (交易所拒单或网络错误)
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Filled => write!(f, "filled"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filled" => Ok(TransactionStatus::Filled),
            "failed" => Ok(TransactionStatus::Failed),
            _ => Err(format!("Unknown TransactionStatus: {}", s)),
        }
    }
}

/// # Summary
/// 交易流水记录，append-only，是审计与日内限额统计的数据来源。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TransactionRecord {
    /// 系统内唯一流水 ID
    pub id: String,
    /// 交易标的
    pub symbol: String,
    /// 买卖方向
    pub side: OrderSide,
    /// 数量
    pub volume: Decimal,
    /// 成交价 (失败流水记录触发时的参考价)
    pub price: Decimal,
    /// 流水状态
    pub status: TransactionStatus,
    /// 触发来源
    pub origin: TradeOrigin,
    /// 附加说明 (触发规则、拒单原因等)
    pub detail: String,
    /// 记录时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 单个标的的自动交易策略行。
///
/// # Invariants
/// - `buy_below` 与 `sell_above` 至少一个存在时策略才有意义，
///   两者均为 None 的启用策略在评估时直接跳过。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AutoTradePolicy {
    /// 交易标的
    pub symbol: String,
    /// 资产类别
    pub kind: AssetKind,
    /// 是否启用
    pub enabled: bool,
    /// 价格跌破该阈值时买入
    pub buy_below: Option<Decimal>,
    /// 价格突破该阈值时卖出
    pub sell_above: Option<Decimal>,
    /// 每次触发的委托数量
    pub order_volume: Decimal,
    /// 单日最大自动成交笔数
    pub max_daily_trades: u32,
    /// 最后修改时间
    pub updated_at: DateTime<Utc>,
}
