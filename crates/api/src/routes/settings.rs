//! # 设置与自动交易策略路由控制器
//!
//! 设置与策略的任何变更都会同步调整交易引擎的协程编排。

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::routes::{parse_decimal, parse_kind};
use crate::server::AppState;
use crate::types::{ApiResponse, PolicyRequest};
use soba_core::store::port::Settings;
use soba_core::trade::entity::AutoTradePolicy;

/// 获取全局设置
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "设置 (Settings)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Settings>)
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    let settings = state.portfolio.get_settings().await?;
    Ok(Json(ApiResponse::ok(settings)))
}

/// 更新全局设置
///
/// 保存后按新设置重排交易引擎的评估协程。
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    tag = "设置 (Settings)",
    security(("bearer_jwt" = [])),
    request_body = Settings,
    responses(
        (status = 200, description = "更新成功", body = ApiResponse<Settings>),
        (status = 400, description = "参数错误")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Json(settings): Json<Settings>,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    if settings.poll_interval_secs == 0 {
        return Err(ApiError::BadRequest("poll_interval_secs must be positive".into()));
    }
    state.portfolio.save_settings(&settings).await?;

    // 全量重排：先停掉全部协程，再按新设置拉起
    state.engine.stop_all();
    state.engine.start().await?;

    Ok(Json(ApiResponse::ok(settings)))
}

/// 列出自动交易策略
#[utoipa::path(
    get,
    path = "/api/v1/autotrade",
    tag = "自动交易 (AutoTrade)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<AutoTradePolicy>>)
    )
)]
pub async fn list_policies(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<AutoTradePolicy>>>, ApiError> {
    let policies = state.portfolio.list_policies().await?;
    Ok(Json(ApiResponse::ok(policies)))
}

/// 写入标的的自动交易策略
///
/// Upsert 策略行并重启该标的的评估协程。
#[utoipa::path(
    put,
    path = "/api/v1/autotrade/{symbol}",
    tag = "自动交易 (AutoTrade)",
    security(("bearer_jwt" = [])),
    params(
        ("symbol" = String, Path, description = "交易代码")
    ),
    request_body = PolicyRequest,
    responses(
        (status = 200, description = "写入成功", body = ApiResponse<AutoTradePolicy>),
        (status = 400, description = "参数错误")
    )
)]
pub async fn upsert_policy(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(symbol): Path<String>,
    Json(req): Json<PolicyRequest>,
) -> Result<Json<ApiResponse<AutoTradePolicy>>, ApiError> {
    let kind = parse_kind(&req.kind)?;
    let buy_below = req
        .buy_below
        .as_deref()
        .map(|s| parse_decimal("buy_below", s))
        .transpose()?;
    let sell_above = req
        .sell_above
        .as_deref()
        .map(|s| parse_decimal("sell_above", s))
        .transpose()?;
    if req.enabled && buy_below.is_none() && sell_above.is_none() {
        return Err(ApiError::BadRequest(
            "an enabled policy needs at least one threshold".into(),
        ));
    }
    let order_volume = parse_decimal("order_volume", &req.order_volume)?;

    let policy = AutoTradePolicy {
        symbol: symbol.clone(),
        kind,
        enabled: req.enabled,
        buy_below,
        sell_above,
        order_volume,
        max_daily_trades: req.max_daily_trades,
        updated_at: Utc::now(),
    };

    state.portfolio.save_policy(&policy).await?;
    state.engine.apply_policy(&policy).await?;

    Ok(Json(ApiResponse::ok(policy)))
}
