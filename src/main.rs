use axum::{
    routing::{get, post},
    Router,
};
use bill_fraudcheck_rust::{api, connect_store, AppConfig, FraudCheckService};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 指纹库: PostgreSQL 或内存
    let store = connect_store(config.database.url.as_deref()).await?;
    let service = Arc::new(FraudCheckService::new(store, config.scoring.clone()));

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/bills/verify", post(api::verify_bill))
        .route("/api/bills/verify/batch", post(api::verify_batch))
        .route("/api/tax-id/:gstin", get(api::verify_tax_id))
        .with_state(service)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/bills/verify        - single bill fraud check");
    info!("  POST /api/bills/verify/batch  - sequential batch fraud check");
    info!("  GET  /api/tax-id/:gstin       - standalone GSTIN check");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
