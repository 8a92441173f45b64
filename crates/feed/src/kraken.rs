use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{TimeZone, Utc};
use futures::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use soba_core::common::Asset;
use soba_core::market::entity::{Candle, Tick};
use soba_core::market::error::MarketError;
use soba_core::market::port::{MarketDataProvider, TickStream};
use soba_core::trade::entity::{ExecutionReport, OrderRequest, OrderSide};
use soba_core::trade::port::{Exchange, TradeError};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// 断线重连的最大退避间隔
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// # Summary
/// Kraken 公开行情提供者实现（加密货币通道）。
///
/// # Invariants
/// - WebSocket 使用 v2 协议 (`wss://ws.kraken.com/v2`) 的 ticker 频道。
/// - REST 历史数据来自 `/0/public/OHLC`。
#[derive(Clone)]
pub struct KrakenProvider {
    client: Client,
    ws_url: String,
    rest_url: String,
}

impl KrakenProvider {
    pub fn new(ws_url: String, rest_url: String) -> Result<Self, MarketError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MarketError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            ws_url,
            rest_url,
        })
    }
}

/// REST 接口的 pair 参数不带斜杠 (BTC/USD -> BTCUSD)
fn rest_pair(symbol: &str) -> String {
    symbol.replace('/', "")
}

/// # Summary
/// Kraken 公开接口响应的通用外壳。
///
/// # Invariants
/// - `error` 非空即视为业务失败，`result` 不可信。
#[derive(Deserialize, Debug)]
struct PublicEnvelope {
    #[serde(default)]
    error: Vec<String>,
    result: Option<serde_json::Value>,
}

/// # Summary
/// 解析 OHLC result 中的行数据。
///
/// # Logic
/// result 是 {pair: [[time, open, high, low, close, vwap, volume, count]...], "last": ts}
/// 的映射，pair 键名由服务端规范化，无法预先得知，需跳过 "last" 取首个数组。
fn parse_ohlc_rows(result: &serde_json::Value) -> Result<Vec<Candle>, MarketError> {
    let obj = result
        .as_object()
        .ok_or_else(|| MarketError::Parse("OHLC result is not an object".into()))?;

    let rows = obj
        .iter()
        .find(|(k, v)| k.as_str() != "last" && v.is_array())
        .map(|(_, v)| v)
        .and_then(|v| v.as_array())
        .ok_or(MarketError::NotFound)?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let cols = row
            .as_array()
            .ok_or_else(|| MarketError::Parse("OHLC row is not an array".into()))?;
        if cols.len() < 7 {
            return Err(MarketError::Parse("OHLC row too short".into()));
        }

        let ts = cols[0]
            .as_i64()
            .ok_or_else(|| MarketError::Parse("OHLC timestamp is not a number".into()))?;
        let time = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| MarketError::Parse(format!("Bad timestamp: {}", ts)))?;

        // 价格与成交量字段是字符串形式的十进制数
        let num = |v: &serde_json::Value| -> Result<f64, MarketError> {
            v.as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| MarketError::Parse(format!("Bad OHLC number: {}", v)))
        };

        candles.push(Candle {
            time,
            open: num(&cols[1])?,
            high: num(&cols[2])?,
            low: num(&cols[3])?,
            close: num(&cols[4])?,
            volume: num(&cols[6])?,
        });
    }

    Ok(candles)
}

/// WebSocket v2 订阅报文
#[derive(Serialize)]
struct SubscribeRequest<'a> {
    method: &'a str,
    params: SubscribeParams<'a>,
}

#[derive(Serialize)]
struct SubscribeParams<'a> {
    channel: &'a str,
    symbol: Vec<&'a str>,
}

/// WebSocket v2 推送帧顶层结构（只关心 channel 与 data）
#[derive(Deserialize, Debug)]
struct ChannelFrame {
    channel: Option<String>,
    #[serde(default)]
    data: Vec<TickerItem>,
}

/// ticker 频道条目，v2 协议中数值为原生 JSON number
#[derive(Deserialize, Debug)]
struct TickerItem {
    symbol: String,
    last: f64,
}

#[async_trait]
impl MarketDataProvider for KrakenProvider {
    /// # Summary
    /// 从 Kraken 公开 OHLC 接口抓取历史 K 线。
    ///
    /// # Logic
    /// 1. 以 1 分钟 interval 请求目标交易对。
    /// 2. 校验 envelope 的 error 数组。
    /// 3. 解析动态键名的 result 并截取最近 `limit` 根。
    ///
    /// # Arguments
    /// * `asset`: 资产身份。
    /// * `limit`: K 线数量上限。
    async fn fetch_history(&self, asset: &Asset, limit: usize) -> Result<Vec<Candle>, MarketError> {
        let url = format!("{}/0/public/OHLC", self.rest_url);
        let pair = rest_pair(&asset.symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[("pair", pair.as_str()), ("interval", "1")])
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MarketError::Network(format!("HTTP {}", resp.status())));
        }

        let body: PublicEnvelope = resp
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        if let Some(err) = body.error.first() {
            return Err(MarketError::Unknown(err.clone()));
        }

        let result = body.result.ok_or(MarketError::NotFound)?;
        let mut candles = parse_ohlc_rows(&result)?;

        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        Ok(candles)
    }

    /// # Summary
    /// 订阅 ticker 实时流。
    ///
    /// # Logic
    /// 1. 创建异步通道并立即返回接收端。
    /// 2. 后台任务建立 v2 连接，订阅 ticker 频道。
    /// 3. snapshot 与 update 帧统一转为 Tick 下发。
    /// 4. 断线按指数退避重连，下游关闭后任务退出。
    async fn subscribe_ticks(&self, asset: &Asset) -> Result<TickStream, MarketError> {
        let (tx, rx) = mpsc::channel(256);
        let url = self.ws_url.clone();
        let symbol = asset.symbol.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);

            loop {
                match run_ticker_session(&url, &symbol, &tx).await {
                    Ok(()) => {
                        info!("Kraken subscriber for {} finished", symbol);
                        return;
                    }
                    Err(e) => {
                        warn!("Kraken stream for {} lost: {}", symbol, e);
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

/// 单次 ticker 会话：连接、订阅、分发。
async fn run_ticker_session(
    url: &str,
    symbol: &str,
    tx: &mpsc::Sender<Tick>,
) -> Result<(), MarketError> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| MarketError::Network(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe = SubscribeRequest {
        method: "subscribe",
        params: SubscribeParams {
            channel: "ticker",
            symbol: vec![symbol],
        },
    };
    let payload = serde_json::to_string(&subscribe)
        .map_err(|e| MarketError::Parse(e.to_string()))?;
    write
        .send(Message::Text(payload))
        .await
        .map_err(|e| MarketError::Subscription(e.to_string()))?;

    info!("Kraken subscribed: {}", symbol);

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: ChannelFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(_) => {
                        // 订阅确认、状态帧等结构不同的报文直接略过
                        debug!("Skipping non-ticker Kraken frame");
                        continue;
                    }
                };

                if frame.channel.as_deref() != Some("ticker") {
                    continue;
                }

                for item in frame.data {
                    if item.symbol != symbol {
                        continue;
                    }
                    let tick = Tick {
                        symbol: item.symbol,
                        price: item.last,
                        volume: None,
                        time: Utc::now(),
                    };
                    if tx.send(tick).await.is_err() {
                        return Ok(());
                    }
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

// ============================================================
//  私有下单通道
// ============================================================

/// # Summary
/// Kraken 私有下单通道实现 (`/0/private/AddOrder`)。
///
/// # Invariants
/// - 每个请求携带严格递增的 nonce。
/// - `API-Sign` 为 HMAC-SHA512(secret, path + SHA256(nonce + postdata))
///   的 Base64 编码，secret 先经 Base64 解码。
pub struct KrakenExchange {
    client: Client,
    rest_url: String,
    api_key: String,
    api_secret: String,
}

impl KrakenExchange {
    pub fn new(rest_url: String, api_key: String, api_secret: String) -> Result<Self, TradeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| TradeError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rest_url,
            api_key,
            api_secret,
        })
    }

    /// # Summary
    /// 计算 API-Sign 请求签名。
    ///
    /// # Logic
    /// 1. Base64 解码 secret。
    /// 2. digest = SHA256(nonce + postdata)。
    /// 3. sign = HMAC-SHA512(secret, path + digest)，再 Base64 编码。
    fn sign(&self, path: &str, nonce: &str, postdata: &str) -> Result<String, TradeError> {
        let secret = BASE64
            .decode(&self.api_secret)
            .map_err(|_| TradeError::InternalError("API secret is not valid base64".into()))?;

        let mut hasher = Sha256::new();
        hasher.update(nonce.as_bytes());
        hasher.update(postdata.as_bytes());
        let digest = hasher.finalize();

        let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|_| TradeError::InternalError("Invalid HMAC key length".into()))?;
        mac.update(path.as_bytes());
        mac.update(&digest);

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// 市价单缺少同步成交价，回查公开 Ticker 的最新成交价作为记录参考。
    async fn last_trade_price(&self, symbol: &str) -> Result<Decimal, TradeError> {
        let url = format!("{}/0/public/Ticker", self.rest_url);
        let pair = rest_pair(symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[("pair", pair.as_str())])
            .send()
            .await
            .map_err(|e| TradeError::Network(e.to_string()))?;

        let body: PublicEnvelope = resp
            .json()
            .await
            .map_err(|e| TradeError::Network(e.to_string()))?;

        if let Some(err) = body.error.first() {
            return Err(TradeError::ExchangeRejected(err.clone()));
        }

        let result = body
            .result
            .ok_or_else(|| TradeError::NoQuote(symbol.to_string()))?;
        let last = result
            .as_object()
            .and_then(|obj| obj.values().next())
            .and_then(|pair_data| pair_data.get("c"))
            .and_then(|c| c.get(0))
            .and_then(|v| v.as_str())
            .ok_or_else(|| TradeError::NoQuote(symbol.to_string()))?;

        Decimal::from_str(last).map_err(|e| TradeError::InternalError(e.to_string()))
    }
}

/// AddOrder 成功时的 result 结构
#[derive(Deserialize, Debug)]
struct AddOrderResult {
    #[serde(default)]
    txid: Vec<String>,
}

#[async_trait]
impl Exchange for KrakenExchange {
    /// # Summary
    /// 提交订单到 Kraken 并构造成交回报。
    ///
    /// # Logic
    /// 1. 组装 form 报文: nonce / pair / type / ordertype / volume [/ price]。
    /// 2. 计算 API-Sign 并携带 API-Key 头发起 POST。
    /// 3. envelope.error 非空映射为 ExchangeRejected。
    /// 4. 回报价格：限价单取限价，市价单回查最新成交价。
    ///
    /// # Arguments
    /// * `request` - 标准化下单意图。
    ///
    /// # Returns
    /// 成功返回含 txid 的成交回报。
    async fn place_order(&self, request: &OrderRequest) -> Result<ExecutionReport, TradeError> {
        let path = "/0/private/AddOrder";
        let nonce = Utc::now().timestamp_millis().to_string();

        let side = match request.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };
        let ordertype = if request.limit_price.is_some() {
            "limit"
        } else {
            "market"
        };

        let mut form = vec![
            ("nonce".to_string(), nonce.clone()),
            ("pair".to_string(), rest_pair(&request.symbol)),
            ("type".to_string(), side.to_string()),
            ("ordertype".to_string(), ordertype.to_string()),
            ("volume".to_string(), request.volume.to_string()),
        ];
        if let Some(price) = request.limit_price {
            form.push(("price".to_string(), price.to_string()));
        }

        let postdata = encode_form(&form);
        let signature = self.sign(path, &nonce, &postdata)?;
        let url = format!("{}{}", self.rest_url, path);

        let resp = self
            .client
            .post(&url)
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(postdata)
            .send()
            .await
            .map_err(|e| TradeError::Network(e.to_string()))?;

        let body: PublicEnvelope = resp
            .json()
            .await
            .map_err(|e| TradeError::Network(e.to_string()))?;

        if let Some(err) = body.error.first() {
            return Err(TradeError::ExchangeRejected(err.clone()));
        }

        let result: AddOrderResult = body
            .result
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TradeError::InternalError(e.to_string()))?
            .unwrap_or(AddOrderResult { txid: Vec::new() });

        let order_ref = result
            .txid
            .first()
            .cloned()
            .unwrap_or_else(|| format!("kraken-{}", nonce));

        let price = match request.limit_price {
            Some(p) => p,
            None => self.last_trade_price(&request.symbol).await?,
        };

        info!(
            "Kraken order accepted: {} {} {} @ {} (txid {})",
            side, request.volume, request.symbol, price, order_ref
        );

        Ok(ExecutionReport {
            order_ref,
            symbol: request.symbol.clone(),
            side: request.side,
            price,
            volume: request.volume,
            commission: Decimal::ZERO,
            executed_at: Utc::now(),
        })
    }
}

/// 按 application/x-www-form-urlencoded 规则拼接键值对。
///
/// 字段值均为本系统生成的数字与交易对代码，无需处理保留字符转义。
fn encode_form(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_pair_strips_slash() {
        assert_eq!(rest_pair("BTC/USD"), "BTCUSD");
        assert_eq!(rest_pair("ETHUSD"), "ETHUSD");
    }

    #[test]
    fn test_parse_ohlc_rows() {
        let raw = serde_json::json!({
            "XXBTZUSD": [
                [1688671200, "30306.1", "30306.2", "30305.7", "30305.7", "30306.1", "3.39", 2],
                [1688671260, "30305.7", "30307.0", "30305.0", "30306.5", "30306.0", "1.25", 5]
            ],
            "last": 1688671260
        });
        let candles = parse_ohlc_rows(&raw).unwrap();
        assert_eq!(candles.len(), 2);
        assert!((candles[0].open - 30306.1).abs() < f64::EPSILON);
        assert!((candles[1].close - 30306.5).abs() < f64::EPSILON);
        assert!((candles[1].volume - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ticker_frame_parsing() {
        let raw = r#"{"channel":"ticker","type":"update","data":[{"symbol":"BTC/USD","bid":64229.1,"ask":64230.2,"last":64230.0,"volume":1234.5}]}"#;
        let frame: ChannelFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.channel.as_deref(), Some("ticker"));
        assert_eq!(frame.data[0].symbol, "BTC/USD");
        assert!((frame.data[0].last - 64230.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_envelope_error_detection() {
        let raw = r#"{"error":["EGeneral:Invalid arguments"]}"#;
        let body: PublicEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(body.error[0], "EGeneral:Invalid arguments");
        assert!(body.result.is_none());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let exchange = KrakenExchange::new(
            "https://api.kraken.com".to_string(),
            "key".to_string(),
            BASE64.encode(b"super-secret-bytes"),
        )
        .unwrap();

        let a = exchange
            .sign("/0/private/AddOrder", "1616492376594", "nonce=1616492376594&pair=BTCUSD")
            .unwrap();
        let b = exchange
            .sign("/0/private/AddOrder", "1616492376594", "nonce=1616492376594&pair=BTCUSD")
            .unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());

        // postdata 变化必须改变签名
        let c = exchange
            .sign("/0/private/AddOrder", "1616492376594", "nonce=1616492376594&pair=ETHUSD")
            .unwrap();
        assert_ne!(a, c);
    }
}
