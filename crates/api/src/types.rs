//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================
//  行情相关 DTO
// ============================================================

/// 实时报价 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    /// 交易代码
    #[schema(example = "BTC/USD")]
    pub symbol: String,
    /// 最新成交价
    #[schema(example = 64230.5)]
    pub price: f64,
    /// 快照更新时间 (ISO 8601)
    #[schema(example = "2026-08-01T10:00:00Z")]
    pub updated_at: String,
}

/// 近期价格窗口 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    /// 交易代码
    #[schema(example = "AAPL")]
    pub symbol: String,
    /// 按时间升序的收盘价
    pub closes: Vec<f64>,
}

/// 指标决策数据 DTO：最新指标报告加近期收盘价
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    /// 指标报告
    pub report: soba_core::analysis::entity::TechnicalReport,
    /// 报告计算所用的收盘价窗口
    pub closes: Vec<f64>,
}

// ============================================================
//  持仓与交易 DTO
// ============================================================

/// 追踪新标的请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackRequest {
    /// 交易代码
    #[schema(example = "AAPL")]
    pub symbol: String,
    /// 资产类别 ("stock" 或 "crypto")
    #[schema(example = "stock")]
    pub kind: String,
}

/// 手动下单请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteOrderRequest {
    /// 交易代码
    #[schema(example = "BTC/USD")]
    pub symbol: String,
    /// 资产类别 ("stock" 或 "crypto")
    #[schema(example = "crypto")]
    pub kind: String,
    /// 买卖方向 ("buy" 或 "sell")
    #[schema(example = "buy")]
    pub side: String,
    /// 委托数量
    #[schema(example = "0.5")]
    pub volume: String,
    /// 限价，缺省为市价单
    #[schema(example = "64000.0")]
    pub limit_price: Option<String>,
}

/// 成交回报 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResponse {
    /// 交易所回执号
    #[schema(example = "paper-7f6a…")]
    pub order_ref: String,
    /// 交易代码
    #[schema(example = "BTC/USD")]
    pub symbol: String,
    /// 方向
    #[schema(example = "buy")]
    pub side: String,
    /// 成交价
    #[schema(example = "64000.0")]
    pub price: String,
    /// 成交数量
    #[schema(example = "0.5")]
    pub volume: String,
    /// 手续费
    #[schema(example = "8.32")]
    pub commission: String,
    /// 成交时间 (ISO 8601)
    #[schema(example = "2026-08-01T10:00:00Z")]
    pub executed_at: String,
}

/// 策略行写入请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PolicyRequest {
    /// 资产类别 ("stock" 或 "crypto")
    #[schema(example = "crypto")]
    pub kind: String,
    /// 是否启用
    #[schema(example = true)]
    pub enabled: bool,
    /// 价格跌破该阈值时买入
    #[schema(example = "30000")]
    pub buy_below: Option<String>,
    /// 价格突破该阈值时卖出
    #[schema(example = "70000")]
    pub sell_above: Option<String>,
    /// 每次触发的委托数量
    #[schema(example = "0.1")]
    pub order_volume: String,
    /// 单日最大自动成交笔数
    #[schema(example = 3)]
    pub max_daily_trades: u32,
}

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// ============================================================
//  鉴权 DTO
// ============================================================

/// 登录请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// 用户名
    #[schema(example = "admin")]
    pub username: String,
    /// 密码
    #[schema(example = "password123")]
    pub password: String,
}

/// 修改密码请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// 原密码
    #[schema(example = "oldpassword123")]
    pub old_password: String,
    /// 新密码
    #[schema(example = "newSecurePwd!")]
    pub new_password: String,
}

/// 创建新用户请求体 (仅管理员)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// 用户登录 ID
    #[schema(example = "trader_01")]
    pub id: String,
    /// 用户显示名
    #[schema(example = "John Doe")]
    pub name: String,
    /// 新用户密码
    #[schema(example = "P@ssw0rd!")]
    pub password: String,
    /// 角色 (Admin 或 Standard)
    #[schema(example = "Standard")]
    pub role: String,
}

/// 用户基础信息响应 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// 用户唯一标识
    #[schema(example = "admin")]
    pub id: String,
    /// 显示名称
    #[schema(example = "System Administrator")]
    pub name: String,
    /// 角色
    #[schema(example = "Admin")]
    pub role: String,
    /// 注册时间
    #[schema(example = "2026-08-01T00:00:00Z")]
    pub created_at: String,
}

/// 登录成功返回的 Token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// JWT Bearer Token
    #[schema(example = "eyJhbGciOiJIUzI1NiIs...")]
    pub token: String,
    /// Token 过期时间 (秒)
    #[schema(example = 86400)]
    pub expires_in: u64,
}

/// JWT Claims 内容 (内部使用，不暴露到 Swagger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户唯一标识
    pub sub: String,
    /// 角色 ("Admin" 或 "Standard")
    pub role: String,
    /// Token 过期时间 (Unix 时间戳)
    pub exp: usize,
}

// ============================================================
//  领域模型 → DTO 惯用转换 (impl From<T>)
// ============================================================

impl From<soba_core::market::entity::Quote> for QuoteResponse {
    fn from(q: soba_core::market::entity::Quote) -> Self {
        Self {
            symbol: q.symbol,
            price: q.price,
            updated_at: q.updated_at.to_rfc3339(),
        }
    }
}

impl From<soba_core::trade::entity::ExecutionReport> for ExecutionResponse {
    fn from(r: soba_core::trade::entity::ExecutionReport) -> Self {
        Self {
            order_ref: r.order_ref,
            symbol: r.symbol,
            side: r.side.to_string(),
            price: r.price.to_string(),
            volume: r.volume.to_string(),
            commission: r.commission.to_string(),
            executed_at: r.executed_at.to_rfc3339(),
        }
    }
}

impl From<&soba_core::store::port::User> for UserResponse {
    fn from(u: &soba_core::store::port::User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            role: u.role.to_string(),
            created_at: u.created_at.to_rfc3339(),
        }
    }
}
