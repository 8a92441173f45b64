use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use soba_core::common::AssetKind;
use soba_core::store::error::StoreError;
use soba_core::store::port::{Holding, PortfolioStore, Settings};
use soba_core::trade::entity::AutoTradePolicy;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

/// 中心数据库文件名
const APP_DB: &str = "app.db";

/// 十进制字段以 TEXT 存储，读取时解析
fn parse_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|e| StoreError::Database(format!("Bad decimal '{}': {}", s, e)))
}

fn parse_kind(s: &str) -> Result<AssetKind, StoreError> {
    s.parse::<AssetKind>().map_err(StoreError::Database)
}

/// # Summary
/// PortfolioStore 的 SQLite 实现，管理持仓、全局设置与自动交易策略。
///
/// # Invariants
/// - 表结构在存储实例创建时初始化。
/// - 所有操作均通过共享的 `SqlitePool` 执行。
pub struct SqlitePortfolioStore {
    pool: SqlitePool,
}

impl SqlitePortfolioStore {
    /// 在配置的数据根目录下打开中心数据库。
    pub async fn new() -> Result<Self, StoreError> {
        Self::open(&crate::config::get_root_dir()).await
    }

    /// # Summary
    /// 在指定目录下打开并初始化存储。
    ///
    /// # Logic
    /// 1. 确保目录存在。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 连接后执行 DDL 初始化表结构。
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::InitError(e.to_string()))?;
        let db_path = dir.join(APP_DB);

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holdings (
                symbol TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                quantity TEXT NOT NULL,
                avg_price TEXT NOT NULL,
                last_updated DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                auto_trade_enabled INTEGER NOT NULL,
                poll_interval_secs INTEGER NOT NULL,
                default_order_volume TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auto_trade_policies (
                symbol TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                buy_below TEXT,
                sell_above TEXT,
                order_volume TEXT NOT NULL,
                max_daily_trades INTEGER NOT NULL,
                updated_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    fn row_to_holding(
        r: (String, String, String, String, DateTime<Utc>),
    ) -> Result<Holding, StoreError> {
        Ok(Holding {
            symbol: r.0,
            kind: parse_kind(&r.1)?,
            quantity: parse_decimal(&r.2)?,
            avg_price: parse_decimal(&r.3)?,
            last_updated: r.4,
        })
    }

    fn row_to_policy(
        r: (
            String,
            String,
            bool,
            Option<String>,
            Option<String>,
            String,
            i64,
            DateTime<Utc>,
        ),
    ) -> Result<AutoTradePolicy, StoreError> {
        Ok(AutoTradePolicy {
            symbol: r.0,
            kind: parse_kind(&r.1)?,
            enabled: r.2,
            buy_below: r.3.as_deref().map(parse_decimal).transpose()?,
            sell_above: r.4.as_deref().map(parse_decimal).transpose()?,
            order_volume: parse_decimal(&r.5)?,
            max_daily_trades: u32::try_from(r.6).unwrap_or(0),
            updated_at: r.7,
        })
    }
}

#[async_trait]
impl PortfolioStore for SqlitePortfolioStore {
    /// # Summary
    /// 列出持仓，可按资产类别过滤。
    ///
    /// # Logic
    /// 查询 `holdings` 表并按 symbol 升序返回。
    async fn list_holdings(&self, kind: Option<AssetKind>) -> Result<Vec<Holding>, StoreError> {
        let rows = match kind {
            Some(k) => {
                sqlx::query_as::<_, (String, String, String, String, DateTime<Utc>)>(
                    "SELECT symbol, kind, quantity, avg_price, last_updated FROM holdings WHERE kind = ? ORDER BY symbol ASC",
                )
                .bind(k.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, (String, String, String, String, DateTime<Utc>)>(
                    "SELECT symbol, kind, quantity, avg_price, last_updated FROM holdings ORDER BY symbol ASC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_holding).collect()
    }

    async fn get_holding(&self, symbol: &str) -> Result<Option<Holding>, StoreError> {
        sqlx::query_as::<_, (String, String, String, String, DateTime<Utc>)>(
            "SELECT symbol, kind, quantity, avg_price, last_updated FROM holdings WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(Self::row_to_holding)
        .transpose()
    }

    /// # Summary
    /// 保存或更新持仓。
    ///
    /// # Logic
    /// 在 `holdings` 表上执行 `INSERT OR REPLACE`。
    async fn upsert_holding(&self, holding: &Holding) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO holdings (symbol, kind, quantity, avg_price, last_updated) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&holding.symbol)
        .bind(holding.kind.to_string())
        .bind(holding.quantity.to_string())
        .bind(holding.avg_price.to_string())
        .bind(holding.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove_holding(&self, symbol: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM holdings WHERE symbol = ?")
            .bind(symbol)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 获取全局设置。
    ///
    /// # Logic
    /// 查询单例行，不存在时返回默认设置。
    async fn get_settings(&self) -> Result<Settings, StoreError> {
        let row = sqlx::query_as::<_, (bool, i64, String)>(
            "SELECT auto_trade_enabled, poll_interval_secs, default_order_volume FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((enabled, interval, volume)) => Ok(Settings {
                auto_trade_enabled: enabled,
                poll_interval_secs: u64::try_from(interval).unwrap_or(30),
                default_order_volume: parse_decimal(&volume)?,
            }),
            None => Ok(Settings::default()),
        }
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let interval = i64::try_from(settings.poll_interval_secs)
            .map_err(|_| StoreError::Database("poll_interval_secs out of range".into()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO settings (id, auto_trade_enabled, poll_interval_secs, default_order_volume) VALUES (1, ?, ?, ?)",
        )
        .bind(settings.auto_trade_enabled)
        .bind(interval)
        .bind(settings.default_order_volume.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_policies(&self) -> Result<Vec<AutoTradePolicy>, StoreError> {
        let rows = sqlx::query_as::<_, (
            String,
            String,
            bool,
            Option<String>,
            Option<String>,
            String,
            i64,
            DateTime<Utc>,
        )>(
            "SELECT symbol, kind, enabled, buy_below, sell_above, order_volume, max_daily_trades, updated_at FROM auto_trade_policies ORDER BY symbol ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_policy).collect()
    }

    async fn get_policy(&self, symbol: &str) -> Result<Option<AutoTradePolicy>, StoreError> {
        sqlx::query_as::<_, (
            String,
            String,
            bool,
            Option<String>,
            Option<String>,
            String,
            i64,
            DateTime<Utc>,
        )>(
            "SELECT symbol, kind, enabled, buy_below, sell_above, order_volume, max_daily_trades, updated_at FROM auto_trade_policies WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(Self::row_to_policy)
        .transpose()
    }

    /// # Summary
    /// 保存或更新策略行。
    ///
    /// # Logic
    /// 在 `auto_trade_policies` 表上执行 `INSERT OR REPLACE`。
    async fn save_policy(&self, policy: &AutoTradePolicy) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO auto_trade_policies (symbol, kind, enabled, buy_below, sell_above, order_volume, max_daily_trades, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&policy.symbol)
        .bind(policy.kind.to_string())
        .bind(policy.enabled)
        .bind(policy.buy_below.map(|d| d.to_string()))
        .bind(policy.sell_above.map(|d| d.to_string()))
        .bind(policy.order_volume.to_string())
        .bind(i64::from(policy.max_daily_trades))
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
