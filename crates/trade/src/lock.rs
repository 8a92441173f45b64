use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use soba_core::store::error::StoreError;
use soba_core::store::port::LockStore;
use std::sync::Arc;
use tracing::debug;

/// 锁的陈旧判定阈值：超过 5 分钟未释放的锁视为被遗弃，允许抢占
pub const LOCK_TTL_MINUTES: i64 = 5;

/// # Summary
/// 交易锁服务：进程内 Map 加数据库锁行的两段式互斥提示。
///
/// # Invariants
/// - 进程内 Map 仅是快路径，跨进程裁决以数据库锁行为准。
/// - 这是 best-effort 的重复执行抑制，不承诺严格互斥。
pub struct TradeLockService {
    // 进程内已持有的锁及其获取时间
    local: DashMap<String, DateTime<Utc>>,
    // 数据库锁行端口
    store: Arc<dyn LockStore>,
    // 本进程的持有者标识
    holder: String,
}

impl TradeLockService {
    pub fn new(store: Arc<dyn LockStore>, holder: impl Into<String>) -> Self {
        Self {
            local: DashMap::new(),
            store,
            holder: holder.into(),
        }
    }

    fn ttl() -> Duration {
        Duration::minutes(LOCK_TTL_MINUTES)
    }

    /// # Summary
    /// 尝试获取指定标的的交易锁。
    ///
    /// # Logic
    /// 1. 快路径：进程内 Map 已有未过期记录则直接失败。
    /// 2. 慢路径：请求数据库锁行的条件 Upsert。
    /// 3. 数据库获取成功后登记进程内记录。
    ///
    /// # Arguments
    /// * `symbol`: 交易标的。
    /// * `now`: 当前时间（由调用方注入，便于测试）。
    ///
    /// # Returns
    /// 成功持有返回 true。
    pub async fn acquire(&self, symbol: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        if let Some(entry) = self.local.get(symbol) {
            if *entry.value() > now - Self::ttl() {
                debug!("In-process lock for {} still held", symbol);
                return Ok(false);
            }
        }

        let acquired = self
            .store
            .try_acquire(symbol, &self.holder, now, Self::ttl())
            .await?;

        if acquired {
            self.local.insert(symbol.to_string(), now);
        }
        Ok(acquired)
    }

    /// # Summary
    /// 释放指定标的的交易锁（两个半边一起清除）。
    pub async fn release(&self, symbol: &str) -> Result<(), StoreError> {
        self.local.remove(symbol);
        self.store.release(symbol, &self.holder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// 永远放行的数据库锁桩，用于单测进程内快路径
    struct AlwaysYesStore;

    #[async_trait]
    impl LockStore for AlwaysYesStore {
        async fn try_acquire(
            &self,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
            _: Duration,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn release(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_local_fast_path_blocks_reacquire() {
        let service = TradeLockService::new(Arc::new(AlwaysYesStore), "worker-test");
        let now = Utc::now();

        assert!(service.acquire("BTC/USD", now).await.unwrap());
        // 即使数据库放行，进程内记录也会拦下二次获取
        assert!(!service.acquire("BTC/USD", now).await.unwrap());

        // 本地记录过期后允许重新走数据库裁决
        let later = now + Duration::minutes(LOCK_TTL_MINUTES + 1);
        assert!(service.acquire("BTC/USD", later).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_clears_local_half() {
        let service = TradeLockService::new(Arc::new(AlwaysYesStore), "worker-test");
        let now = Utc::now();

        assert!(service.acquire("ETH/USD", now).await.unwrap());
        service.release("ETH/USD").await.unwrap();
        assert!(service.acquire("ETH/USD", now).await.unwrap());
    }
}
