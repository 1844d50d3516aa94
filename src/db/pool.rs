use crate::db::{queries, BillStore, MemoryBillStore, PgBillStore};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// 创建数据库连接池
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut connect_options = PgConnectOptions::from_str(database_url)?;

    // 设置慢查询日志阈值为 5秒
    connect_options = connect_options.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(5),
    );

    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

/// 有数据库 url 时连接 PostgreSQL 并建表, 否则使用内存指纹库
pub async fn connect_store(database_url: Option<&str>) -> Result<Arc<dyn BillStore>, sqlx::Error> {
    match database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            queries::init_schema(&pool).await?;
            tracing::info!("Using PostgreSQL fingerprint store");
            Ok(Arc::new(PgBillStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory fingerprint store");
            Ok(Arc::new(MemoryBillStore::new()))
        }
    }
}
