//! # 持仓路由控制器
//!
//! 追踪标的的增删查。新增标的会同步预热行情聚合根，
//! 使 Dashboard 首屏即有实时数据可用。

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_kind;
use crate::server::AppState;
use crate::types::{ApiResponse, TrackRequest};
use soba_core::common::Asset;
use soba_core::store::port::Holding;

#[derive(Deserialize, ToSchema)]
pub struct HoldingsQuery {
    /// 资产类别过滤 ("stock" / "crypto")，缺省返回全部
    pub kind: Option<String>,
}

/// 列出追踪中的持仓
#[utoipa::path(
    get,
    path = "/api/v1/holdings",
    tag = "持仓 (Holdings)",
    security(("bearer_jwt" = [])),
    params(
        ("kind" = Option<String>, Query, description = "资产类别过滤 (stock / crypto)")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<Holding>>),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn list_holdings(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<HoldingsQuery>,
) -> Result<Json<ApiResponse<Vec<Holding>>>, ApiError> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let holdings = state.portfolio.list_holdings(kind).await?;
    Ok(Json(ApiResponse::ok(holdings)))
}

/// 追踪新标的
///
/// 创建空持仓行并预热行情聚合根。
#[utoipa::path(
    post,
    path = "/api/v1/holdings",
    tag = "持仓 (Holdings)",
    security(("bearer_jwt" = [])),
    request_body = TrackRequest,
    responses(
        (status = 200, description = "追踪成功", body = ApiResponse<Holding>),
        (status = 400, description = "参数错误")
    )
)]
pub async fn track_symbol(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Json(req): Json<TrackRequest>,
) -> Result<Json<ApiResponse<Holding>>, ApiError> {
    if req.symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("symbol must not be empty".into()));
    }
    let kind = parse_kind(&req.kind)?;

    // 已存在时保持原持仓不动
    let holding = match state.portfolio.get_holding(&req.symbol).await? {
        Some(existing) => existing,
        None => {
            let mut holding = Holding::empty(req.symbol.clone(), kind);
            holding.last_updated = Utc::now();
            state.portfolio.upsert_holding(&holding).await?;
            holding
        }
    };

    // 常驻追踪，启动行情抓取
    let asset = Asset {
        symbol: req.symbol.clone(),
        kind,
    };
    state.market.track(&asset).await?;

    Ok(Json(ApiResponse::ok(holding)))
}

/// 停止追踪标的
///
/// 删除持仓行并停掉对应的自动交易评估协程。
#[utoipa::path(
    delete,
    path = "/api/v1/holdings/{symbol}",
    tag = "持仓 (Holdings)",
    security(("bearer_jwt" = [])),
    params(
        ("symbol" = String, Path, description = "交易代码")
    ),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn untrack_symbol(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.engine.stop_symbol(&symbol);
    state.market.untrack(&symbol);
    state.portfolio.remove_holding(&symbol).await?;
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
