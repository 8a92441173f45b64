use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use soba_core::store::error::StoreError;
use soba_core::store::port::LockStore;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use tracing::debug;

/// 中心数据库文件名
const APP_DB: &str = "app.db";

/// # Summary
/// LockStore 的 SQLite 实现，自动交易锁的数据库半边。
///
/// # Invariants
/// - 获取操作是一条带条件的 Upsert，以数据库的行级原子性裁决竞争。
/// - 陈旧锁（超过 TTL 未释放）允许被任何持有者抢占。
pub struct SqliteLockStore {
    pool: SqlitePool,
}

impl SqliteLockStore {
    pub async fn new() -> Result<Self, StoreError> {
        Self::open(&crate::config::get_root_dir()).await
    }

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
            CREATE TABLE IF NOT EXISTS trade_locks (
                symbol TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                acquired_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl LockStore for SqliteLockStore {
    /// # Summary
    /// 尝试获取指定标的的锁行。
    ///
    /// # Logic
    /// 1. 不存在则插入，视为获取成功。
    /// 2. 存在但 `acquired_at` 早于陈旧阈值 (now - ttl) 时抢占改写。
    /// 3. 条件不满足时 Upsert 不影响任何行，视为获取失败。
    ///
    /// # Arguments
    /// * `symbol`: 交易标的。
    /// * `holder`: 持有者标识。
    /// * `now`: 当前时间（由调用方注入，便于测试）。
    /// * `ttl`: 陈旧判定阈值。
    async fn try_acquire(
        &self,
        symbol: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let stale_before = now - ttl;

        let result = sqlx::query(
            r#"
            INSERT INTO trade_locks (symbol, holder, acquired_at)
            VALUES (?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE
                SET holder = excluded.holder, acquired_at = excluded.acquired_at
                WHERE trade_locks.acquired_at <= ?
            "#,
        )
        .bind(symbol)
        .bind(holder)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let acquired = result.rows_affected() == 1;
        if !acquired {
            debug!("Lock row for {} is held, acquire skipped", symbol);
        }
        Ok(acquired)
    }

    /// 释放锁行，仅持有者本人可释放。
    async fn release(&self, symbol: &str, holder: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM trade_locks WHERE symbol = ? AND holder = ?")
            .bind(symbol)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
