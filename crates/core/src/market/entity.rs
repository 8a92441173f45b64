use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 单笔实时成交事件 (Tick)，来自上游 WebSocket 推送。
///
/// # Invariants
/// - `price` 必须为正数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    // 交易代码
    pub symbol: String,
    // 最新成交价
    pub price: f64,
    // 本笔成交量 (部分数据源不提供)
    pub volume: Option<f64>,
    // 成交时间
    pub time: DateTime<Utc>,
}

/// # Summary
/// 单根 K 线数据实体，用于历史回溯与指标计算。
///
/// # Invariants
/// - `high` 必须大于或等于 `low`, `open`, `close`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    // K 线开始时间
    pub time: DateTime<Utc>,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量
    pub volume: f64,
}

/// # Summary
/// 聚合根对外暴露的最新报价快照。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    // 最新成交价
    pub price: f64,
    // 快照更新时间
    pub updated_at: DateTime<Utc>,
}
