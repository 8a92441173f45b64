use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 指标综合给出的建议信号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Signal::Buy),
            "sell" => Ok(Signal::Sell),
            "hold" => Ok(Signal::Hold),
            _ => Err(format!("Unknown Signal: {}", s)),
        }
    }
}

/// # Summary
/// 单个标的的技术指标快照。每次计算覆盖上一份，只保留最新。
///
/// # Invariants
/// - 数据不足时对应字段为 None（RSI 例外，数据不足时取中性值 50）。
/// - `fib_levels` 按价格升序排列。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TechnicalReport {
    /// 交易标的
    pub symbol: String,
    /// 简单移动平均 (20 期)
    pub sma: Option<f64>,
    /// 指数移动平均 (20 期)
    pub ema: Option<f64>,
    /// 相对强弱指数 (14 期)，数据不足时为中性值 50
    pub rsi: f64,
    /// 布林带上轨
    pub boll_upper: Option<f64>,
    /// 布林带中轨 (等于同期 SMA)
    pub boll_middle: Option<f64>,
    /// 布林带下轨
    pub boll_lower: Option<f64>,
    /// 斐波那契回撤位，自低到高
    pub fib_levels: Vec<f64>,
    /// 综合建议信号
    pub signal: Signal,
    /// 计算时参与的样本数
    pub sample_size: u32,
    /// 计算时间
    pub computed_at: DateTime<Utc>,
}
