use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use soba_core::common::Asset;
use soba_core::market::entity::{Candle, Tick};
use soba_core::market::error::MarketError;
use soba_core::market::port::{MarketDataProvider, TickStream};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// 断线重连的最大退避间隔
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// # Summary
/// Finnhub 行情提供者实现（股票通道）。
///
/// # Invariants
/// - REST 请求通过共享的 `reqwest` 异步客户端执行。
/// - WebSocket 订阅任务在长连接中断后按指数退避自动重建。
#[derive(Clone)]
pub struct FinnhubProvider {
    client: Client,
    token: String,
    ws_url: String,
    rest_url: String,
}

impl FinnhubProvider {
    /// # Summary
    /// 创建一个新的 FinnhubProvider 实例。
    ///
    /// # Logic
    /// 1. 配置 10 秒超时的 HTTP 客户端。
    /// 2. 记录 Token 与端点地址，供后续请求拼接。
    ///
    /// # Arguments
    /// * `token`: Finnhub API Token。
    /// * `ws_url`: WebSocket 端点，如 `wss://ws.finnhub.io`。
    /// * `rest_url`: REST 端点，如 `https://finnhub.io/api/v1`。
    pub fn new(token: String, ws_url: String, rest_url: String) -> Result<Self, MarketError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MarketError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token,
            ws_url,
            rest_url,
        })
    }
}

/// # Summary
/// Finnhub `/stock/candle` 接口响应结构。
///
/// # Invariants
/// - `s` 为 "ok" 时各数组等长；为 "no_data" 时数组缺失。
#[derive(Deserialize, Debug)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

/// WebSocket 订阅报文
#[derive(Serialize)]
struct SubscribeFrame<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    symbol: &'a str,
}

/// WebSocket 推送帧顶层结构
#[derive(Deserialize, Debug)]
struct StreamFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Vec<TradeItem>,
}

/// 单笔成交条目: s=代码, p=价格, t=毫秒时间戳, v=数量
#[derive(Deserialize, Debug)]
struct TradeItem {
    s: String,
    p: f64,
    t: i64,
    v: Option<f64>,
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    /// # Summary
    /// 从 Finnhub 抓取历史 K 线。
    ///
    /// # Logic
    /// 1. 以 1 分钟分辨率请求最近 `limit` 根所覆盖的时间窗口。
    /// 2. 解析列式响应并按行重组为 Candle。
    /// 3. `s == "no_data"` 视为空结果而非错误。
    ///
    /// # Arguments
    /// * `asset`: 证券身份。
    /// * `limit`: K 线数量上限。
    ///
    /// # Returns
    /// 成功返回按时间升序的 K 线列表。
    async fn fetch_history(&self, asset: &Asset, limit: usize) -> Result<Vec<Candle>, MarketError> {
        let to = Utc::now().timestamp();
        let from = to - (limit as i64) * 60;
        let url = format!("{}/stock/candle", self.rest_url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", asset.symbol.as_str()),
                ("resolution", "1"),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MarketError::Network(format!("HTTP {}", resp.status())));
        }

        let body: CandleResponse = resp
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        if body.s == "no_data" {
            return Ok(Vec::new());
        }
        if body.s != "ok" {
            return Err(MarketError::Unknown(format!("Finnhub status: {}", body.s)));
        }

        let mut candles = Vec::with_capacity(body.t.len());
        for (i, &ts) in body.t.iter().enumerate() {
            if let (Some(&o), Some(&h), Some(&l), Some(&c), Some(&v)) = (
                body.o.get(i),
                body.h.get(i),
                body.l.get(i),
                body.c.get(i),
                body.v.get(i),
            ) {
                let time = Utc
                    .timestamp_opt(ts, 0)
                    .single()
                    .ok_or_else(|| MarketError::Parse(format!("Bad timestamp: {}", ts)))?;
                candles.push(Candle {
                    time,
                    open: o,
                    high: h,
                    low: l,
                    close: c,
                    volume: v,
                });
            }
        }

        Ok(candles)
    }

    /// # Summary
    /// 订阅实时成交流。
    ///
    /// # Logic
    /// 1. 创建异步通道 (mpsc) 并立即返回其接收端。
    /// 2. 后台任务循环建立 WebSocket 连接、发送订阅报文、分发成交帧。
    /// 3. 连接中断后按 1s 起步的指数退避重连，上限 60s。
    /// 4. 下游接收端被丢弃时任务自行退出。
    ///
    /// # Arguments
    /// * `asset`: 证券身份。
    ///
    /// # Returns
    /// 成功返回异步成交流 `TickStream`。
    async fn subscribe_ticks(&self, asset: &Asset) -> Result<TickStream, MarketError> {
        let (tx, rx) = mpsc::channel(256);
        let url = format!("{}?token={}", self.ws_url, self.token);
        let symbol = asset.symbol.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);

            loop {
                match run_session(&url, &symbol, &tx).await {
                    Ok(()) => {
                        // run_session 只在下游关闭时正常返回
                        info!("Finnhub subscriber for {} finished", symbol);
                        return;
                    }
                    Err(e) => {
                        warn!("Finnhub stream for {} lost: {}", symbol, e);
                    }
                }

                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_RECONNECT_BACKOFF);

                if tx.is_closed() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// # Summary
/// 单次 WebSocket 会话：连接、订阅、分发，直到连接断开或下游关闭。
///
/// # Logic
/// 1. 建立连接后发送 subscribe 报文。
/// 2. `trade` 帧逐条转为 Tick 发往通道。
/// 3. `ping` 文本帧由服务端心跳机制处理，协议层 Ping 回 Pong。
///
/// # Returns
/// * `Ok(())` - 下游接收端已关闭，无需重连。
/// * `Err(MarketError)` - 连接层故障，调用方负责退避重连。
async fn run_session(
    url: &str,
    symbol: &str,
    tx: &mpsc::Sender<Tick>,
) -> Result<(), MarketError> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| MarketError::Network(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe = SubscribeFrame {
        kind: "subscribe",
        symbol,
    };
    let payload = serde_json::to_string(&subscribe)
        .map_err(|e| MarketError::Parse(e.to_string()))?;
    write
        .send(Message::Text(payload))
        .await
        .map_err(|e| MarketError::Subscription(e.to_string()))?;

    info!("Finnhub subscribed: {}", symbol);

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: StreamFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        debug!("Skipping unparsable Finnhub frame: {}", e);
                        continue;
                    }
                };

                match frame.kind.as_str() {
                    "trade" => {
                        for item in frame.data {
                            if item.s != symbol {
                                continue;
                            }
                            let time = Utc
                                .timestamp_millis_opt(item.t)
                                .single()
                                .unwrap_or_else(Utc::now);
                            let tick = Tick {
                                symbol: item.s,
                                price: item.p,
                                volume: item.v,
                                time,
                            };
                            if tx.send(tick).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    "ping" => {}
                    other => debug!("Ignoring Finnhub frame type: {}", other),
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                return Err(MarketError::Network("WebSocket closed by peer".into()));
            }
            Err(e) => {
                return Err(MarketError::Network(e.to_string()));
            }
            _ => {}
        }
    }

    Err(MarketError::Network("WebSocket stream ended".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_frame_parsing() {
        let raw = r#"{"data":[{"p":260.05,"s":"AAPL","t":1575526691134,"v":0.0093}],"type":"trade"}"#;
        let frame: StreamFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "trade");
        assert_eq!(frame.data.len(), 1);
        assert_eq!(frame.data[0].s, "AAPL");
        assert!((frame.data[0].p - 260.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ping_frame_parsing() {
        let raw = r#"{"type":"ping"}"#;
        let frame: StreamFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "ping");
        assert!(frame.data.is_empty());
    }

    #[test]
    fn test_no_data_candle_response() {
        let raw = r#"{"s":"no_data"}"#;
        let body: CandleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.s, "no_data");
        assert!(body.t.is_empty());
    }
}
