use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use soba_analysis::report::ReportBuilder;
use soba_api::server::AppState;
use soba_core::config::AppConfig;
use soba_core::market::port::{Market, MarketDataProvider};
use soba_core::notify::port::Notifier;
use soba_core::store::port::PortfolioStore;
use soba_core::trade::port::Exchange;
use soba_feed::finnhub::FinnhubProvider;
use soba_feed::kraken::{KrakenExchange, KrakenProvider};
use soba_market::hub::MarketHub;
use soba_notify::email::EmailNotifier;
use soba_notify::telegram::TelegramNotifier;
use soba_store::journal::SqliteJournalStore;
use soba_store::lock::SqliteLockStore;
use soba_store::portfolio::SqlitePortfolioStore;
use soba_store::system::SqliteSystemStore;
use soba_trade::engine::TradeEngine;
use soba_trade::lock::TradeLockService;
use soba_trade::paper::PaperExchange;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// # Summary
/// 加载分层配置：默认值 <- config/default.toml <- SOBA_* 环境变量。
fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let cfg = config::Config::builder()
        .add_source(config::Config::try_from(&AppConfig::default())?)
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::Environment::with_prefix("SOBA").separator("__"))
        .build()?;
    Ok(cfg.try_deserialize()?)
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入到各领域服务。
///
/// # Logic
/// 1. 加载配置并初始化全局日志（控制台 + 按天滚动文件）。
/// 2. 实例化基础设施层（Store、Feed、Notify）。
/// 3. 实例化领域实现层（MarketHub、Exchange、TradeEngine、ReportBuilder）。
/// 4. 启动自动交易引擎与 HTTP API。
/// 5. 挂起等待外部信号退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let app_config = Arc::new(load_config()?);

    let file_appender = tracing_appender::rolling::daily("logs", "soba.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    info!("Soba starting...");

    // 2. 基础设施层：存储
    soba_store::config::set_root_dir(PathBuf::from(&app_config.database.data_dir));
    let portfolio = Arc::new(SqlitePortfolioStore::new().await?);
    let journal = Arc::new(SqliteJournalStore::new().await?);
    let lock_store = Arc::new(SqliteLockStore::new().await?);
    let system_store = Arc::new(SqliteSystemStore::new().await?);
    system_store.ensure_default_admin().await?;

    // 2b. 基础设施层：行情源
    let feeds = &app_config.feeds;
    if feeds.finnhub_token.is_empty() {
        warn!("Finnhub token is empty, stock feed will be rejected upstream");
    }
    let finnhub: Arc<dyn MarketDataProvider> = Arc::new(FinnhubProvider::new(
        feeds.finnhub_token.clone(),
        feeds.finnhub_ws_url.clone(),
        feeds.finnhub_rest_url.clone(),
    )?);
    let kraken_feed = KrakenProvider::new(feeds.kraken_ws_url.clone(), feeds.kraken_rest_url.clone())?;
    let kraken: Arc<dyn MarketDataProvider> = Arc::new(kraken_feed);

    // 3. 领域实现层
    let market: Arc<dyn Market> = MarketHub::new(finnhub, kraken);

    // 已追踪的持仓在启动时恢复常驻行情
    for holding in portfolio.list_holdings(None).await? {
        let asset = soba_core::common::Asset {
            symbol: holding.symbol.clone(),
            kind: holding.kind,
        };
        if let Err(e) = market.track(&asset).await {
            warn!("Failed to resume tracking {}: {}", holding.symbol, e);
        }
    }

    let trading = &app_config.trading;
    let exchange: Arc<dyn Exchange> = if trading.mode == "live" && !trading.kraken_api_key.is_empty()
    {
        info!("Trading mode: live (Kraken)");
        Arc::new(KrakenExchange::new(
            feeds.kraken_rest_url.clone(),
            trading.kraken_api_key.clone(),
            trading.kraken_api_secret.clone(),
        )?)
    } else {
        info!("Trading mode: paper");
        let rate = Decimal::from_f64_retain(trading.paper_commission_rate)
            .unwrap_or(Decimal::ZERO);
        Arc::new(PaperExchange::new(market.clone(), rate))
    };

    // 2c. 通知通道（未配置的通道不装载）
    let notify = &app_config.notify;
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if !notify.telegram_bot_token.is_empty() {
        notifiers.push(Arc::new(TelegramNotifier::new(
            notify.telegram_bot_token.clone(),
            notify.telegram_chat_id.clone(),
        )));
    }
    if !notify.smtp_host.is_empty() {
        notifiers.push(Arc::new(EmailNotifier::new(
            &notify.smtp_host,
            &notify.smtp_user,
            &notify.smtp_pass,
            &notify.mail_from,
            &notify.mail_to,
        )?));
    }

    let locks = TradeLockService::new(lock_store, format!("soba-{}", Uuid::new_v4()));
    let engine = TradeEngine::new(
        market.clone(),
        exchange,
        portfolio.clone(),
        journal.clone(),
        locks,
        notifiers,
        soba_core::common::backoff::BackoffPolicy::standard(),
    );
    engine.start().await?;

    let analysis = Arc::new(ReportBuilder::new(journal.clone()));

    // 4. 组装 API 状态并启动服务
    let state = AppState {
        market,
        portfolio,
        journal,
        system_store,
        engine: engine.clone(),
        analysis,
        app_config: app_config.clone(),
    };

    let bind_addr = format!("{}:{}", app_config.server.host, app_config.server.port);

    // 5. 挂起主线程，等待外部退出信号
    tokio::select! {
        result = soba_api::server::start_server(state, &bind_addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting...");
            engine.stop_all();
        }
    }

    Ok(())
}
