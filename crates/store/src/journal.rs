use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use soba_core::analysis::entity::{Signal, TechnicalReport};
use soba_core::store::error::StoreError;
use soba_core::store::port::JournalStore;
use soba_core::trade::entity::{OrderSide, TradeOrigin, TransactionRecord, TransactionStatus};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

/// 中心数据库文件名
const APP_DB: &str = "app.db";

fn parse_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|e| StoreError::Database(format!("Bad decimal '{}': {}", s, e)))
}

/// # Summary
/// JournalStore 的 SQLite 实现：append-only 交易流水与最新指标快照。
///
/// # Invariants
/// - `transactions` 只追加，永不更新。
/// - `technical_reports` 每个 symbol 只保留最新一份。
pub struct SqliteJournalStore {
    pool: SqlitePool,
}

impl SqliteJournalStore {
    pub async fn new() -> Result<Self, StoreError> {
        Self::open(&crate::config::get_root_dir()).await
    }

    /// # Summary
    /// 在指定目录下打开并初始化存储。
    ///
    /// # Logic
    /// 1. 确保目录存在并连接数据库。
    /// 2. 初始化流水表、指标快照表及查询索引。
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
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                volume TEXT NOT NULL,
                price TEXT NOT NULL,
                status TEXT NOT NULL,
                origin TEXT NOT NULL,
                detail TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tx_symbol_time
                ON transactions (symbol, origin, created_at);

            CREATE TABLE IF NOT EXISTS technical_reports (
                symbol TEXT PRIMARY KEY,
                sma REAL,
                ema REAL,
                rsi REAL NOT NULL,
                boll_upper REAL,
                boll_middle REAL,
                boll_lower REAL,
                fib_levels TEXT NOT NULL,
                signal TEXT NOT NULL,
                sample_size INTEGER NOT NULL,
                computed_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }

    #[allow(clippy::type_complexity)]
    fn row_to_record(
        r: (String, String, String, String, String, String, String, String, DateTime<Utc>),
    ) -> Result<TransactionRecord, StoreError> {
        Ok(TransactionRecord {
            id: r.0,
            symbol: r.1,
            side: OrderSide::from_str(&r.2).map_err(StoreError::Database)?,
            volume: parse_decimal(&r.3)?,
            price: parse_decimal(&r.4)?,
            status: TransactionStatus::from_str(&r.5).map_err(StoreError::Database)?,
            origin: TradeOrigin::from_str(&r.6).map_err(StoreError::Database)?,
            detail: r.7,
            created_at: r.8,
        })
    }
}

#[async_trait]
impl JournalStore for SqliteJournalStore {
    /// # Summary
    /// 追加一条交易流水。
    async fn append_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO transactions (id, symbol, side, volume, price, status, origin, detail, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.symbol)
        .bind(record.side.to_string())
        .bind(record.volume.to_string())
        .bind(record.price.to_string())
        .bind(record.status.to_string())
        .bind(record.origin.to_string())
        .bind(&record.detail)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 按时间倒序列出最近的交易流水。
    async fn list_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, (
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            DateTime<Utc>,
        )>(
            "SELECT id, symbol, side, volume, price, status, origin, detail, created_at FROM transactions ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    /// # Summary
    /// 统计某标的自指定时间以来已成交的自动交易笔数。
    ///
    /// # Logic
    /// 只统计 origin = 'auto' 且 status = 'filled' 的流水。
    async fn count_auto_trades_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM transactions WHERE symbol = ? AND origin = 'auto' AND status = 'filled' AND created_at >= ?",
        )
        .bind(symbol)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// # Summary
    /// 保存指标快照（按 symbol 覆盖）。
    async fn save_report(&self, report: &TechnicalReport) -> Result<(), StoreError> {
        let fib = serde_json::to_string(&report.fib_levels)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO technical_reports (symbol, sma, ema, rsi, boll_upper, boll_middle, boll_lower, fib_levels, signal, sample_size, computed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&report.symbol)
        .bind(report.sma)
        .bind(report.ema)
        .bind(report.rsi)
        .bind(report.boll_upper)
        .bind(report.boll_middle)
        .bind(report.boll_lower)
        .bind(fib)
        .bind(report.signal.to_string())
        .bind(i64::from(report.sample_size))
        .bind(report.computed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 读取某标的最新指标快照。
    async fn latest_report(&self, symbol: &str) -> Result<Option<TechnicalReport>, StoreError> {
        #[allow(clippy::type_complexity)]
        let row: Option<(
            String,
            Option<f64>,
            Option<f64>,
            f64,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            String,
            String,
            i64,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT symbol, sma, ema, rsi, boll_upper, boll_middle, boll_lower, fib_levels, signal, sample_size, computed_at FROM technical_reports WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(|r| {
            let fib_levels: Vec<f64> = serde_json::from_str(&r.7)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(TechnicalReport {
                symbol: r.0,
                sma: r.1,
                ema: r.2,
                rsi: r.3,
                boll_upper: r.4,
                boll_middle: r.5,
                boll_lower: r.6,
                fib_levels,
                signal: Signal::from_str(&r.8).map_err(StoreError::Database)?,
                sample_size: u32::try_from(r.9).unwrap_or(0),
                computed_at: r.10,
            })
        })
        .transpose()
    }
}
