//! # `soba-feed` - 外部行情与交易所适配
//!
//! 对接两条上游通道：
//! - Finnhub：股票实时成交 WebSocket 与历史 K 线 REST。
//! - Kraken：加密货币 ticker WebSocket (v2)、公开 OHLC REST
//!   以及私有下单接口 (AddOrder)。
//!
//! 上游协议被视为不可控的外部契约，本 crate 只做客户端侧的
//! 报文编解码与断线自愈，不在此层做任何业务决策。

pub mod finnhub;
pub mod kraken;
