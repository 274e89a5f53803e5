use axum::{Router, routing::get};
use sekai_best30::features::catalog::{CatalogStore, create_catalog_router};
use sekai_best30::features::health::health_check;
use sekai_best30::features::image::create_image_router;
use sekai_best30::features::ranking::create_ranking_router;
use sekai_best30::openapi::ApiDoc;
use sekai_best30::startup::catalog_loader::{self, CatalogSource};
use sekai_best30::startup::run_startup_checks;
use sekai_best30::state::AppState;
use sekai_best30::{ShutdownManager, config::AppConfig};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 只排除不该压缩的响应：PNG 本身已压缩，SSE 压缩会引入缓冲。
    // 保留默认的最小大小阈值（32B）。
    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
        .and(NotForContentType::const_new("font/"))
}


fn init_tracing(config: &AppConfig) {
    let default_filter = format!(
        "sekai_best30={},tower_http={}",
        config.logging.level, config.logging.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    // 配置先于日志加载：日志级别与格式来自配置
    let config_result = AppConfig::init_global();
    let config = AppConfig::global();
    init_tracing(config);
    if let Err(e) = config_result {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }

    // 创建优雅退出管理器
    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run_startup_checks(config) {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // 首次加载曲目目录：失败则不接受请求
    let source = CatalogSource::from_config(config);
    let catalog = match catalog_loader::load_initial(&source).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("曲目目录首次加载失败: {}", e);
            std::process::exit(1);
        }
    };
    let store = CatalogStore::with_catalog(catalog);
    let refresh_task = catalog_loader::spawn_refresh_task(
        store.clone(),
        source,
        config.catalog.refresh_interval(),
        shutdown_manager.clone(),
    );

    let app_state = AppState::from_config(config, store);

    let resources_root = config.resources_path();
    let app = Router::<AppState>::new()
        .route("/", get(|| async { "Hello World" }))
        .route("/health", get(health_check))
        .merge(create_catalog_router())
        .merge(create_ranking_router())
        .merge(create_image_router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // 其余路径按静态资源处理（曲绘、背景等）
        .fallback_service(ServeDir::new(&resources_root))
        .with_state(app_state)
        .layer(CompressionLayer::new().compress_when(compression_predicate()));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Static resources: {:?}", resources_root);

    let shutdown_timeout = config.shutdown.timeout_duration();
    let signal_manager = shutdown_manager.clone();
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = signal_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    // 服务器出错时也要让后台任务退出
    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        shutdown_manager.trigger_shutdown(sekai_best30::ShutdownReason::Application);
        std::process::exit(1);
    }

    match tokio::time::timeout(shutdown_timeout, refresh_task).await {
        Ok(_) => tracing::info!("优雅退出完成"),
        Err(_) => tracing::warn!(
            "优雅退出超时（{}秒），强制退出",
            config.shutdown.timeout_secs
        ),
    }

    tracing::info!("服务器已优雅关闭");
}
