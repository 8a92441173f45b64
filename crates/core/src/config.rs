use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub feeds: FeedsConfig,
    pub trading: TradingConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

/// 行情数据源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    // Finnhub API Token (股票行情)
    pub finnhub_token: String,
    pub finnhub_ws_url: String,
    pub finnhub_rest_url: String,
    // Kraken 公开行情端点 (加密货币)
    pub kraken_ws_url: String,
    pub kraken_rest_url: String,
}

/// 交易执行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    // "paper" 本地模拟成交 / "live" 走 Kraken 真实下单
    pub mode: String,
    pub kraken_api_key: String,
    pub kraken_api_secret: String,
    // 模拟成交使用的手续费率
    pub paper_commission_rate: f64,
}

/// 通知通道配置，空字符串视为未启用对应通道
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub mail_from: String,
    pub mail_to: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                jwt_secret: "YOUR_SUPER_SECRET_KEY".to_string(), // Default for dev, should be overwritten by config
            },
            database: DatabaseConfig {
                data_dir: "data".to_string(),
            },
            feeds: FeedsConfig {
                finnhub_token: String::new(),
                finnhub_ws_url: "wss://ws.finnhub.io".to_string(),
                finnhub_rest_url: "https://finnhub.io/api/v1".to_string(),
                kraken_ws_url: "wss://ws.kraken.com/v2".to_string(),
                kraken_rest_url: "https://api.kraken.com".to_string(),
            },
            trading: TradingConfig {
                mode: "paper".to_string(),
                kraken_api_key: String::new(),
                kraken_api_secret: String::new(),
                paper_commission_rate: 0.0026,
            },
            notify: NotifyConfig {
                telegram_bot_token: String::new(),
                telegram_chat_id: String::new(),
                smtp_host: String::new(),
                smtp_user: String::new(),
                smtp_pass: String::new(),
                mail_from: String::new(),
                mail_to: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.trading.mode, "paper");
        assert_eq!(config.feeds.kraken_ws_url, "wss://ws.kraken.com/v2");
    }
}
