//! # 订单路由控制器
//!
//! 手动下单走与自动交易相同的执行管线（锁、流水、持仓、通知）。

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::routes::{parse_decimal, parse_kind};
use crate::server::AppState;
use crate::types::{ApiResponse, ExecuteOrderRequest, ExecutionResponse};
use soba_core::trade::entity::{OrderRequest, OrderSide, TransactionRecord};

/// 流水列表的默认条数
const DEFAULT_TX_LIMIT: usize = 50;

/// 手动执行订单
#[utoipa::path(
    post,
    path = "/api/v1/orders/execute",
    tag = "订单交易 (Trade)",
    security(("bearer_jwt" = [])),
    request_body = ExecuteOrderRequest,
    responses(
        (status = 200, description = "成交成功", body = ApiResponse<ExecutionResponse>),
        (status = 400, description = "参数错误或交易所拒单"),
        (status = 409, description = "交易锁被占用")
    )
)]
pub async fn execute_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ExecuteOrderRequest>,
) -> Result<Json<ApiResponse<ExecutionResponse>>, ApiError> {
    let kind = parse_kind(&req.kind)?;
    let side = OrderSide::from_str(&req.side).map_err(ApiError::BadRequest)?;
    let volume = parse_decimal("volume", &req.volume)?;
    if volume <= rust_decimal::Decimal::ZERO {
        return Err(ApiError::BadRequest("volume must be positive".into()));
    }
    let limit_price = req
        .limit_price
        .as_deref()
        .map(|s| parse_decimal("limit_price", s))
        .transpose()?;

    let request = OrderRequest {
        symbol: req.symbol.clone(),
        kind,
        side,
        volume,
        limit_price,
    };

    tracing::info!(
        "Manual order from {}: {} {} {}",
        user.id,
        req.side,
        req.volume,
        req.symbol
    );
    let report = state.engine.execute_manual(&request).await?;

    Ok(Json(ApiResponse::ok(report.into())))
}

#[derive(Deserialize, ToSchema)]
pub struct TransactionsQuery {
    /// 返回条数上限，默认 50
    pub limit: Option<usize>,
}

/// 查询交易流水
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "订单交易 (Trade)",
    security(("bearer_jwt" = [])),
    params(
        ("limit" = Option<usize>, Query, description = "返回条数上限，默认 50")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<TransactionRecord>>)
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<ApiResponse<Vec<TransactionRecord>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TX_LIMIT);
    let records = state.journal.list_transactions(limit).await?;
    Ok(Json(ApiResponse::ok(records)))
}
