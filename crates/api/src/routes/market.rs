//! # 行情路由控制器

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_kind;
use crate::server::AppState;
use crate::types::{ApiResponse, HistoryResponse, QuoteResponse};
use soba_core::common::{Asset, AssetKind};

/// 历史窗口的默认数据点数量
const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Deserialize, ToSchema)]
pub struct MarketQuery {
    /// 资产类别 ("stock" / "crypto")，缺省时按持仓行推断
    pub kind: Option<String>,
    /// 历史数据点上限
    pub limit: Option<usize>,
}

/// 未显式给出类别时，按持仓行推断，再退回股票通道
async fn resolve_asset(
    state: &AppState,
    symbol: &str,
    kind: Option<&str>,
) -> Result<Asset, ApiError> {
    let kind = match kind {
        Some(k) => parse_kind(k)?,
        None => state
            .portfolio
            .get_holding(symbol)
            .await?
            .map(|h| h.kind)
            .unwrap_or(AssetKind::Stock),
    };
    Ok(Asset {
        symbol: symbol.to_string(),
        kind,
    })
}

/// 获取实时报价快照
#[utoipa::path(
    get,
    path = "/api/v1/market/quote/{symbol}",
    tag = "行情 (Market)",
    security(("bearer_jwt" = [])),
    params(
        ("symbol" = String, Path, description = "交易代码"),
        ("kind" = Option<String>, Query, description = "资产类别 (stock / crypto)")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<QuoteResponse>),
        (status = 404, description = "标的尚无报价")
    )
)]
pub async fn get_quote(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(symbol): Path<String>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ApiError> {
    let asset = resolve_asset(&state, &symbol, query.kind.as_deref()).await?;
    let instrument = state.market.get_instrument(&asset).await?;

    let quote = instrument
        .quote()
        .ok_or_else(|| ApiError::NotFound(format!("No quote yet for {}", symbol)))?;

    Ok(Json(ApiResponse::ok(quote.into())))
}

/// 获取近期收盘价窗口
#[utoipa::path(
    get,
    path = "/api/v1/market/history/{symbol}",
    tag = "行情 (Market)",
    security(("bearer_jwt" = [])),
    params(
        ("symbol" = String, Path, description = "交易代码"),
        ("kind" = Option<String>, Query, description = "资产类别 (stock / crypto)"),
        ("limit" = Option<usize>, Query, description = "数据点上限，默认 100")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<HistoryResponse>)
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(symbol): Path<String>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<ApiResponse<HistoryResponse>>, ApiError> {
    let asset = resolve_asset(&state, &symbol, query.kind.as_deref()).await?;
    let instrument = state.market.get_instrument(&asset).await?;

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let closes = instrument.recent_closes(limit);

    Ok(Json(ApiResponse::ok(HistoryResponse { symbol, closes })))
}
