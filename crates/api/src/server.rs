//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的 DI 容器持有并调用。

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use soba_analysis::report::ReportBuilder;
use soba_core::config::AppConfig;
use soba_core::market::port::Market;
use soba_core::store::port::{JournalStore, PortfolioStore, SystemStore};
use soba_trade::engine::TradeEngine;

use crate::routes::{admin, analysis, auth, holdings, market, orders, settings};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - 所有端口实现在服务启动前由 DI 容器注入，生命周期与进程等同。
#[derive(Clone)]
pub struct AppState {
    /// 行情领域服务
    pub market: Arc<dyn Market>,
    /// 组合数据端口 (持仓 / 设置 / 策略)
    pub portfolio: Arc<dyn PortfolioStore>,
    /// 流水与指标快照端口
    pub journal: Arc<dyn JournalStore>,
    /// 系统数据端口 (用于鉴权验证和用户管理)
    pub system_store: Arc<dyn SystemStore>,
    /// 自动交易引擎
    pub engine: Arc<TradeEngine>,
    /// 指标报告构建器
    pub analysis: Arc<ReportBuilder>,
    /// 全局配置
    pub app_config: Arc<AppConfig>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Soba 组合监控 API",
        version = "0.1.0",
        description = "股票与加密货币组合监控服务的 RESTful API 网关。提供持仓管理、实时行情、技术指标与自动交易配置功能。",
        contact(name = "Soba Team"),
        license(name = "MIT")
    ),
    tags(
        (name = "鉴权 (Auth)", description = "JWT 获取、密码修改登录认证相关API"),
        (name = "系统管理 (Admin)", description = "用户开户等管理API"),
        (name = "持仓 (Holdings)", description = "追踪标的的增删查"),
        (name = "行情 (Market)", description = "实时报价与历史窗口查询"),
        (name = "技术分析 (Analysis)", description = "指标快照与决策数据"),
        (name = "订单交易 (Trade)", description = "手动下单与交易流水"),
        (name = "设置 (Settings)", description = "全局设置"),
        (name = "自动交易 (AutoTrade)", description = "阈值策略的配置与启停")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// 为 OpenAPI 文档注入全局 Bearer JWT 鉴权方案。
///
/// 注册后，Swagger UI 页面顶部将显示 🔒 Authorize 按钮，
/// 用户可以填入 JWT Token 后对所有标记了 `security` 的接口进行鉴权测试。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        // 若 components 不存在则创建
        let components = openapi.components.get_or_insert_with(Default::default);

        // 注册名为 "bearer_jwt" 的 HTTP Bearer 鉴权方案
        components.add_security_scheme(
            "bearer_jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "在此处填入登录接口返回的 JWT Token（无需 'Bearer ' 前缀）",
                    ))
                    .build(),
            ),
        );
    }
}

// ============================================================
//  服务构建与启动
// ============================================================

/// # Summary
/// 构建完整的 axum 应用（含 Swagger UI 与 CORS），供启动器与测试复用。
///
/// # Logic
/// 1. 公开路由：仅登录。
/// 2. 用户路由：JWT 鉴权后的业务接口。
/// 3. Admin 路由：在 JWT 鉴权之上再叠加角色校验。
pub fn build_router(state: AppState) -> Router {
    // 1. 无需鉴权的公开路由
    let public_router = OpenApiRouter::new().routes(routes!(auth::login));

    // 2. 只需要合法 JWT 鉴权的路由 (普通用户)
    let user_protected_router = OpenApiRouter::new()
        .routes(routes!(auth::change_password))
        .routes(routes!(holdings::list_holdings))
        .routes(routes!(holdings::track_symbol))
        .routes(routes!(holdings::untrack_symbol))
        .routes(routes!(market::get_quote))
        .routes(routes!(market::get_history))
        .routes(routes!(analysis::get_analysis))
        .routes(routes!(orders::execute_order))
        .routes(routes!(orders::list_transactions))
        .routes(routes!(settings::get_settings))
        .routes(routes!(settings::update_settings))
        .routes(routes!(settings::list_policies))
        .routes(routes!(settings::upsert_policy))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // 3. 需要 Admin 角色鉴权的路由
    let admin_protected_router = OpenApiRouter::new()
        .routes(routes!(admin::create_user))
        .layer(axum::middleware::from_fn(
            crate::middleware::auth::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // 4. 合并所有路由与自动收集的 OpenAPI Doc
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(public_router)
        .merge(user_protected_router)
        .merge(admin_protected_router)
        .with_state(state)
        .split_for_parts();

    // 5. 配置 CORS (开发阶段允许所有来源)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// 绑定 TCP 端口并启动 HTTP 监听。
///
/// # Arguments
/// * `state` - 由外部 DI 容器注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    tracing::info!("🚀 Soba API Server listening on {}", bind_addr);
    tracing::info!("📖 Swagger UI: http://{}/swagger-ui/", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
