use crate::db::store::{FingerprintRecord, LookbackWindow, SimilarQuery};
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};

/// 供应商金额统计
#[derive(Debug, Clone, FromRow)]
pub struct VendorAmountStat {
    pub bill_count: i64,
    pub avg_amount: Option<BigDecimal>,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS bill_fingerprints (
        tenant_id    VARCHAR(64)   NOT NULL,
        fingerprint  CHAR(64)      NOT NULL,
        bill_id      VARCHAR(64)   NOT NULL,
        vendor_name  TEXT          NOT NULL,
        total_amount NUMERIC(20,4) NOT NULL,
        recorded_at  TIMESTAMPTZ   NOT NULL,
        PRIMARY KEY (tenant_id, fingerprint)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_bill_fingerprints_vendor
        ON bill_fingerprints (tenant_id, lower(vendor_name), recorded_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bill_audit_log (
        id         BIGSERIAL   PRIMARY KEY,
        bill_id    VARCHAR(64) NOT NULL,
        action     VARCHAR(32) NOT NULL,
        details    TEXT        NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// 创建指纹表和审计表 (bills 表由审批流程维护)
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// 条件插入指纹; 返回 true 表示本次插入成功 (此前不存在)
pub async fn insert_fingerprint_if_absent(
    pool: &PgPool,
    record: &FingerprintRecord,
) -> Result<bool, sqlx::Error> {
    let start_time = std::time::Instant::now();

    let result = sqlx::query(
        r#"
        INSERT INTO bill_fingerprints (
            tenant_id, fingerprint, bill_id, vendor_name, total_amount, recorded_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (tenant_id, fingerprint) DO NOTHING
        "#,
    )
    .bind(&record.tenant_id)
    .bind(record.fingerprint.as_str())
    .bind(&record.bill_id)
    .bind(&record.vendor_name)
    .bind(&record.total)
    .bind(record.recorded_at)
    .execute(pool)
    .await?;

    tracing::debug!(
        "fingerprint insert for bill {}: {} row(s), took {:?}",
        record.bill_id,
        result.rows_affected(),
        start_time.elapsed()
    );

    Ok(result.rows_affected() == 1)
}

/// 同租户、同供应商、金额相近且在回溯窗口内的账单是否存在
pub async fn similar_bill_exists(pool: &PgPool, query: &SimilarQuery) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM bill_fingerprints
            WHERE tenant_id = $1
              AND lower(vendor_name) = lower($2)
              AND abs(total_amount - $3) <= $4
              AND recorded_at BETWEEN $5 AND $6
        )
        "#,
    )
    .bind(&query.tenant_id)
    .bind(&query.vendor_name)
    .bind(&query.total)
    .bind(&query.tolerance)
    .bind(query.window.since)
    .bind(query.window.until)
    .fetch_one(pool)
    .await
}

/// 供应商回溯窗口内的账单数和平均金额
pub async fn vendor_amount_stat(
    pool: &PgPool,
    tenant_id: &str,
    vendor_name: &str,
    window: &LookbackWindow,
) -> Result<VendorAmountStat, sqlx::Error> {
    sqlx::query_as::<_, VendorAmountStat>(
        r#"
        SELECT count(*) AS bill_count,
               avg(total_amount) AS avg_amount
        FROM bill_fingerprints
        WHERE tenant_id = $1
          AND lower(vendor_name) = lower($2)
          AND recorded_at BETWEEN $3 AND $4
        "#,
    )
    .bind(tenant_id)
    .bind(vendor_name)
    .bind(window.since)
    .bind(window.until)
    .fetch_one(pool)
    .await
}

/// 供应商被驳回的账单数; bills 表不存在 (42P01) 时视为无驳回记录
pub async fn count_rejected_bills(pool: &PgPool, tenant_id: &str, vendor_name: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT count(*)
        FROM bills
        WHERE tenant_id = $1
          AND lower(vendor_name) = lower($2)
          AND status = 'rejected'
        "#,
    )
    .bind(tenant_id)
    .bind(vendor_name)
    .fetch_one(pool)
    .await;

    match result {
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P01") => {
            tracing::debug!("bills table not found, skipping rejection history");
            Ok(0)
        }
        other => other,
    }
}

/// 写入审计日志
pub async fn insert_audit(pool: &PgPool, bill_id: &str, action: &str, details: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bill_audit_log (bill_id, action, details)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(bill_id)
    .bind(action)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}
