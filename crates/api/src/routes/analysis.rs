//! # 技术分析路由控制器
//!
//! 为前端的决策面板提供指标快照：按当前收盘价窗口现算一份
//! 报告并落库覆盖，同时返回参与计算的原始数据。

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::routes::parse_kind;
use crate::server::AppState;
use crate::types::{AnalysisResponse, ApiResponse};
use soba_core::common::{Asset, AssetKind};

/// 指标计算窗口
const ANALYSIS_WINDOW: usize = 200;

#[derive(Deserialize, ToSchema)]
pub struct AnalysisQuery {
    /// 资产类别 ("stock" / "crypto")，缺省时按持仓行推断
    pub kind: Option<String>,
}

/// 获取标的的指标决策数据
///
/// 对当前收盘价窗口计算 SMA / EMA / RSI / 布林带 / 斐波那契回撤，
/// 覆盖落库后连同原始窗口一并返回。
#[utoipa::path(
    get,
    path = "/api/v1/analysis/{symbol}",
    tag = "技术分析 (Analysis)",
    security(("bearer_jwt" = [])),
    params(
        ("symbol" = String, Path, description = "交易代码"),
        ("kind" = Option<String>, Query, description = "资产类别 (stock / crypto)")
    ),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<AnalysisResponse>),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(symbol): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<ApiResponse<AnalysisResponse>>, ApiError> {
    let kind = match query.kind.as_deref() {
        Some(k) => parse_kind(k)?,
        None => state
            .portfolio
            .get_holding(&symbol)
            .await?
            .map(|h| h.kind)
            .unwrap_or(AssetKind::Stock),
    };

    let asset = Asset {
        symbol: symbol.clone(),
        kind,
    };
    let instrument = state.market.get_instrument(&asset).await?;
    let closes = instrument.recent_closes(ANALYSIS_WINDOW);

    let report = state
        .analysis
        .compute_and_store(&symbol, &closes)
        .await?;

    Ok(Json(ApiResponse::ok(AnalysisResponse { report, closes })))
}
