use super::error::StoreError;
use crate::analysis::entity::TechnicalReport;
use crate::common::AssetKind;
use crate::trade::entity::{AutoTradePolicy, OrderSide, TransactionRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// # Summary
/// 用户角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Standard,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "Admin"),
            UserRole::Standard => write!(f, "Standard"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(UserRole::Admin),
            "Standard" => Ok(UserRole::Standard),
            _ => Err(format!("Unknown UserRole: {}", s)),
        }
    }
}

/// # Summary
/// 用户实体，代表系统的使用者。
///
/// # Invariants
/// - `id` 必须全局唯一。
/// - `password_hash` 存储 bcrypt 哈希，永不存储明文。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // 用户唯一标识
    pub id: String,
    // 用户显示名称
    pub name: String,
    // bcrypt 密码哈希
    pub password_hash: String,
    // 角色
    pub role: UserRole,
    // 是否要求下次登录后强制修改密码
    pub force_password_change: bool,
    // 注册时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 持仓实体，记录用户在特定标的上的持有情况。
///
/// # Invariants
/// - 现货模式下 `quantity` 非负。
/// - `avg_price` 必须非负。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Holding {
    // 交易代码
    pub symbol: String,
    // 资产类别
    pub kind: AssetKind,
    // 持仓数量
    pub quantity: Decimal,
    // 平均持仓成本
    pub avg_price: Decimal,
    // 最后更新时间
    pub last_updated: DateTime<Utc>,
}

impl Holding {
    /// 初始化一个空持仓
    pub fn empty(symbol: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }

    /// # Summary
    /// 按成交回报调整持仓数量与平均成本。
    ///
    /// # Logic
    /// 1. 买入：加权摊薄平均成本，数量累加。
    /// 2. 卖出：数量扣减，平均成本保持不变。
    /// 3. 卖出数量超过持有量时收敛到零并告警（现货不允许负持仓）。
    ///
    /// # Arguments
    /// * `side`: 成交方向。
    /// * `volume`: 成交数量。
    /// * `price`: 成交价格。
    pub fn apply_fill(&mut self, side: OrderSide, volume: Decimal, price: Decimal, now: DateTime<Utc>) {
        if volume.is_zero() {
            return;
        }
        match side {
            OrderSide::Buy => {
                let old_cost = self.quantity * self.avg_price;
                let added_cost = volume * price;
                self.quantity += volume;
                if !self.quantity.is_zero() {
                    self.avg_price = (old_cost + added_cost) / self.quantity;
                }
            }
            OrderSide::Sell => {
                if volume > self.quantity {
                    tracing::warn!(
                        "持仓 {} 卖出异常: 试图卖出 {} 但仅持有 {}",
                        self.symbol,
                        volume,
                        self.quantity
                    );
                    self.quantity = Decimal::ZERO;
                } else {
                    self.quantity -= volume;
                }
                if self.quantity.is_zero() {
                    self.avg_price = Decimal::ZERO;
                }
            }
        }
        self.last_updated = now;
    }
}

/// # Summary
/// 全局设置单例行。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Settings {
    /// 自动交易总开关
    pub auto_trade_enabled: bool,
    /// 自动交易评估轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 未配置策略单量时的默认委托数量
    pub default_order_volume: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_trade_enabled: false,
            poll_interval_secs: 30,
            default_order_volume: Decimal::ONE,
        }
    }
}

/// # Summary
/// 组合数据存储接口，负责持仓、全局设置与自动交易策略的持久化。
///
/// # Invariants
/// - 必须保证同一 symbol 的持仓与策略行唯一。
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    // --- 持仓域 ---

    /// # Summary
    /// 列出持仓。
    ///
    /// # Logic
    /// 查询 `holdings` 表，`kind` 为 None 时返回全部。
    ///
    /// # Arguments
    /// * `kind`: 可选的资产类别过滤。
    ///
    /// # Returns
    /// 按 symbol 升序的持仓列表。
    async fn list_holdings(&self, kind: Option<AssetKind>) -> Result<Vec<Holding>, StoreError>;

    /// 获取单个标的的持仓，不存在返回 None。
    async fn get_holding(&self, symbol: &str) -> Result<Option<Holding>, StoreError>;

    /// # Summary
    /// 保存或更新持仓。
    ///
    /// # Logic
    /// 在 `holdings` 表上执行 Upsert。
    async fn upsert_holding(&self, holding: &Holding) -> Result<(), StoreError>;

    /// 移除指定标的的持仓行。
    async fn remove_holding(&self, symbol: &str) -> Result<(), StoreError>;

    // --- 设置域 ---

    /// 获取全局设置，若尚未写入则返回默认值。
    async fn get_settings(&self) -> Result<Settings, StoreError>;

    /// 保存全局设置 (Upsert 单例行)。
    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError>;

    // --- 自动交易策略域 ---

    /// 列出全部自动交易策略行。
    async fn list_policies(&self) -> Result<Vec<AutoTradePolicy>, StoreError>;

    /// 获取单个标的的策略行，不存在返回 None。
    async fn get_policy(&self, symbol: &str) -> Result<Option<AutoTradePolicy>, StoreError>;

    /// 保存或更新策略行 (Upsert)。
    async fn save_policy(&self, policy: &AutoTradePolicy) -> Result<(), StoreError>;
}

/// # Summary
/// 流水与分析快照存储接口，append-only 交易日志加最新指标报告。
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// 追加一条交易流水。
    async fn append_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    /// # Summary
    /// 按时间倒序列出最近的交易流水。
    ///
    /// # Arguments
    /// * `limit`: 返回条数上限。
    async fn list_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError>;

    /// # Summary
    /// 统计某标的自指定时间以来的自动成交笔数，用于日内限额。
    ///
    /// # Arguments
    /// * `symbol`: 交易标的。
    /// * `since`: 统计窗口起点。
    async fn count_auto_trades_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// 保存指标报告 (按 symbol Upsert 最新一份)。
    async fn save_report(&self, report: &TechnicalReport) -> Result<(), StoreError>;

    /// 获取某标的最新的指标报告。
    async fn latest_report(&self, symbol: &str) -> Result<Option<TechnicalReport>, StoreError>;
}

/// # Summary
/// 交易锁存储接口，自动交易锁的数据库半边。
///
/// # Invariants
/// - `try_acquire` 必须通过条件 Upsert 实现，保证同一连接池内的原子性。
#[async_trait]
pub trait LockStore: Send + Sync {
    /// # Summary
    /// 尝试获取指定标的的数据库锁行。
    ///
    /// # Logic
    /// 1. 若锁行不存在，插入并返回 true。
    /// 2. 若锁行存在但 `acquired_at` 早于 `now - ttl`，视为陈旧锁，
    ///    抢占改写并返回 true。
    /// 3. 否则返回 false。
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
        ttl: chrono::Duration,
    ) -> Result<bool, StoreError>;

    /// 释放锁行（仅持有者本人可释放）。
    async fn release(&self, symbol: &str, holder: &str) -> Result<(), StoreError>;
}

/// # Summary
/// 系统级数据存储接口，负责用户数据的持久化。
#[async_trait]
pub trait SystemStore: Send + Sync {
    /// # Summary
    /// 获取用户信息。
    ///
    /// # Logic
    /// 根据用户 ID 查询 `users` 表。
    ///
    /// # Arguments
    /// * `id`: 用户唯一标识。
    ///
    /// # Returns
    /// 存在返回 `Some(User)`，否则返回 `None`。
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// # Summary
    /// 保存或更新用户信息。
    ///
    /// # Logic
    /// 执行 Upsert 操作写入 `users` 表。
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_holding_buy_averages_cost() {
        let mut h = Holding::empty("AAPL", AssetKind::Stock);
        let now = Utc::now();
        h.apply_fill(OrderSide::Buy, dec!(10), dec!(100), now);
        h.apply_fill(OrderSide::Buy, dec!(10), dec!(200), now);
        assert_eq!(h.quantity, dec!(20));
        assert_eq!(h.avg_price, dec!(150));
    }

    #[test]
    fn test_holding_sell_keeps_avg_and_clamps() {
        let mut h = Holding::empty("BTC/USD", AssetKind::Crypto);
        let now = Utc::now();
        h.apply_fill(OrderSide::Buy, dec!(2), dec!(50000), now);
        h.apply_fill(OrderSide::Sell, dec!(1), dec!(60000), now);
        assert_eq!(h.quantity, dec!(1));
        assert_eq!(h.avg_price, dec!(50000));

        // 超卖收敛到零，均价清零
        h.apply_fill(OrderSide::Sell, dec!(5), dec!(60000), now);
        assert_eq!(h.quantity, Decimal::ZERO);
        assert_eq!(h.avg_price, Decimal::ZERO);
    }
}
