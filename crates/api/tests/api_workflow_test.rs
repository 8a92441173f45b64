use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use soba_api::server::{AppState, build_router};
use soba_api::types::{
    ApiResponse, ChangePasswordRequest, CreateUserRequest, ExecuteOrderRequest, ExecutionResponse,
    LoginRequest, LoginResponse, PolicyRequest, TrackRequest,
};
use soba_analysis::report::ReportBuilder;
use soba_core::common::Asset;
use soba_core::common::backoff::BackoffPolicy;
use soba_core::market::entity::Quote;
use soba_core::market::error::MarketError;
use soba_core::market::port::{Instrument, InstrumentStatus, Market, TickStream};
use soba_core::store::port::{Holding, SystemStore};
use soba_core::trade::entity::TransactionRecord;
use soba_store::journal::SqliteJournalStore;
use soba_store::lock::SqliteLockStore;
use soba_store::portfolio::SqlitePortfolioStore;
use soba_store::system::SqliteSystemStore;
use soba_trade::engine::TradeEngine;
use soba_trade::lock::TradeLockService;
use soba_trade::paper::PaperExchange;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// 固定报价的行情桩：返回恒定价格与一段线性收盘价窗口
struct FixedInstrument {
    identity: Asset,
}

#[async_trait]
impl Instrument for FixedInstrument {
    fn identity(&self) -> &Asset {
        &self.identity
    }
    fn quote(&self) -> Option<Quote> {
        Some(Quote {
            symbol: self.identity.symbol.clone(),
            price: 64000.0,
            updated_at: Utc::now(),
        })
    }
    fn recent_closes(&self, limit: usize) -> Vec<f64> {
        (1..=30).map(|i| 63000.0 + f64::from(i) * 10.0).take(limit).collect()
    }
    fn subscribe(&self) -> TickStream {
        unimplemented!()
    }
    fn status(&self) -> InstrumentStatus {
        InstrumentStatus::Online
    }
}

struct FixedMarket;

#[async_trait]
impl Market for FixedMarket {
    async fn get_instrument(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        Ok(Arc::new(FixedInstrument {
            identity: asset.clone(),
        }))
    }

    async fn track(&self, asset: &Asset) -> Result<Arc<dyn Instrument>, MarketError> {
        self.get_instrument(asset).await
    }

    fn untrack(&self, _symbol: &str) {}
}

// 帮助函数：在随机端口启动测试服务器
async fn spawn_test_server() -> (String, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let portfolio = Arc::new(
        SqlitePortfolioStore::open(tmp_dir.path()).await.expect("portfolio store"),
    );
    let journal = Arc::new(SqliteJournalStore::open(tmp_dir.path()).await.expect("journal store"));
    let lock_store = Arc::new(SqliteLockStore::open(tmp_dir.path()).await.expect("lock store"));
    let system_store: Arc<dyn SystemStore> =
        Arc::new(SqliteSystemStore::open(tmp_dir.path()).await.expect("system store"));

    // 覆盖 admin 的密码为已知测试密码 "test_admin_pwd"
    let hashed = bcrypt::hash("test_admin_pwd", bcrypt::DEFAULT_COST).expect("hash");
    let admin_user = soba_core::store::port::User {
        id: "admin".to_string(),
        name: "Admin".to_string(),
        password_hash: hashed,
        role: soba_core::store::port::UserRole::Admin,
        force_password_change: true,
        created_at: Utc::now(),
    };
    system_store.save_user(&admin_user).await.expect("seed admin");

    let market: Arc<dyn Market> = Arc::new(FixedMarket);
    let exchange = Arc::new(PaperExchange::new(market.clone(), dec!(0.001)));
    let engine = TradeEngine::new(
        market.clone(),
        exchange,
        portfolio.clone(),
        journal.clone(),
        TradeLockService::new(lock_store, "api-test"),
        vec![],
        BackoffPolicy::new(Duration::from_millis(1), 1),
    );
    let analysis = Arc::new(ReportBuilder::new(journal.clone()));
    let app_config = Arc::new(soba_core::config::AppConfig::default());

    let state = AppState {
        market,
        portfolio,
        journal,
        system_store,
        engine,
        analysis,
        app_config,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let addr = format!("http://127.0.0.1:{}", port);

    let router = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    // 稍微等待服务器启动
    tokio::time::sleep(Duration::from_millis(200)).await;

    (addr, tmp_dir)
}

#[tokio::test]
async fn test_full_api_workflow() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let (base_url, _tmp) = spawn_test_server().await;
    let client = reqwest::Client::new();

    // ============================================
    // Case 1: 登录失败 (密码错误)
    // ============================================
    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "admin".to_string(),
            password: "wrongpassword".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // ============================================
    // Case 2: 成功登录 Admin
    // ============================================
    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "admin".to_string(),
            password: "test_admin_pwd".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let login_data: ApiResponse<LoginResponse> = res.json().await.unwrap();
    let admin_token = login_data.data.unwrap().token;

    // ============================================
    // Case 3: 强制改密期间业务接口被锁定
    // ============================================
    let res = client
        .get(format!("{}/api/v1/holdings", base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN, "未改密码即访问业务被拒绝");

    // ============================================
    // Case 4: 修改密码并重新登录
    // ============================================
    let res = client
        .post(format!("{}/api/v1/auth/change_password", base_url))
        .bearer_auth(&admin_token)
        .json(&ChangePasswordRequest {
            old_password: "test_admin_pwd".to_string(),
            new_password: "new_secure_password".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "admin".to_string(),
            password: "new_secure_password".to_string(),
        })
        .send()
        .await
        .unwrap();
    let login_data: ApiResponse<LoginResponse> = res.json().await.unwrap();
    let token = login_data.data.unwrap().token;

    // ============================================
    // Case 5: 追踪标的并读取持仓列表
    // ============================================
    let res = client
        .post(format!("{}/api/v1/holdings", base_url))
        .bearer_auth(&token)
        .json(&TrackRequest {
            symbol: "BTC/USD".to_string(),
            kind: "crypto".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/v1/holdings?kind=crypto", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let holdings: ApiResponse<Vec<Holding>> = res.json().await.unwrap();
    assert_eq!(holdings.data.unwrap().len(), 1);

    // ============================================
    // Case 6: 指标决策数据
    // ============================================
    let res = client
        .get(format!("{}/api/v1/analysis/BTC%2FUSD?kind=crypto", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    // 30 个样本足以算出 20 期布林带，中轨必须等于 SMA
    let report = &body["data"]["report"];
    assert_eq!(report["boll_middle"], report["sma"]);

    // ============================================
    // Case 7: 手动下单并核对流水
    // ============================================
    let res = client
        .post(format!("{}/api/v1/orders/execute", base_url))
        .bearer_auth(&token)
        .json(&ExecuteOrderRequest {
            symbol: "BTC/USD".to_string(),
            kind: "crypto".to_string(),
            side: "buy".to_string(),
            volume: "0.5".to_string(),
            limit_price: None,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let exec: ApiResponse<ExecutionResponse> = res.json().await.unwrap();
    assert_eq!(exec.data.unwrap().side, "buy");

    let res = client
        .get(format!("{}/api/v1/transactions", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let txs: ApiResponse<Vec<TransactionRecord>> = res.json().await.unwrap();
    assert_eq!(txs.data.unwrap().len(), 1);

    // ============================================
    // Case 8: 写入自动交易策略
    // ============================================
    let res = client
        .put(format!("{}/api/v1/autotrade/BTC%2FUSD", base_url))
        .bearer_auth(&token)
        .json(&PolicyRequest {
            kind: "crypto".to_string(),
            enabled: false,
            buy_below: Some("30000".to_string()),
            sell_above: None,
            order_volume: "0.1".to_string(),
            max_daily_trades: 3,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // 启用策略但没有任何阈值 → 400
    let res = client
        .put(format!("{}/api/v1/autotrade/BTC%2FUSD", base_url))
        .bearer_auth(&token)
        .json(&PolicyRequest {
            kind: "crypto".to_string(),
            enabled: true,
            buy_below: None,
            sell_above: None,
            order_volume: "0.1".to_string(),
            max_daily_trades: 3,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // ============================================
    // Case 9: 创建新用户 (Admin) 与权限隔离
    // ============================================
    let res = client
        .post(format!("{}/api/v1/admin/users", base_url))
        .bearer_auth(&token)
        .json(&CreateUserRequest {
            id: "trader_01".to_string(),
            name: "Trader One".to_string(),
            password: "trader_password".to_string(),
            role: "Standard".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // trader 改密后尝试管理员接口 → 403
    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "trader_01".to_string(),
            password: "trader_password".to_string(),
        })
        .send()
        .await
        .unwrap();
    let trader_token = res
        .json::<ApiResponse<LoginResponse>>()
        .await
        .unwrap()
        .data
        .unwrap()
        .token;
    let res = client
        .post(format!("{}/api/v1/auth/change_password", base_url))
        .bearer_auth(&trader_token)
        .json(&ChangePasswordRequest {
            old_password: "trader_password".to_string(),
            new_password: "trader_password_2".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/v1/admin/users", base_url))
        .bearer_auth(&trader_token)
        .json(&CreateUserRequest {
            id: "trader_02".to_string(),
            name: "Trader Two".to_string(),
            password: "pwd".to_string(),
            role: "Standard".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // ============================================
    // Case 10: 无 Token 访问被拒绝
    // ============================================
    let res = client
        .get(format!("{}/api/v1/holdings", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
