use crate::db::queries;
use crate::error::StoreError;
use crate::models::{FraudAssessment, Fingerprint};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// 指纹登记记录: 同租户下 (fingerprint) 唯一
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRecord {
    pub tenant_id: String,
    pub fingerprint: Fingerprint,
    pub bill_id: String,
    pub vendor_name: String,
    pub total: BigDecimal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 首次登记
    Registered,
    /// 同租户下指纹已存在, 未重复写入
    AlreadyPresent,
}

/// 回溯窗口 [since, until], until 为服务端评估时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn ending_at(as_of: DateTime<Utc>, days: i64) -> Self {
        Self {
            since: as_of - Duration::days(days),
            until: as_of,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since && at <= self.until
    }
}

/// 相似账单查询条件
#[derive(Debug, Clone)]
pub struct SimilarQuery {
    pub tenant_id: String,
    pub vendor_name: String,
    pub total: BigDecimal,
    /// 允许的金额绝对差
    pub tolerance: BigDecimal,
    pub window: LookbackWindow,
}

/// 供应商近期账单统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorHistory {
    pub bill_count: u32,
    pub average_total: Option<BigDecimal>,
    pub rejected_count: u32,
}

/// 持久化协作方接口
#[async_trait]
pub trait BillStore: Send + Sync {
    /// 原子地查询并登记指纹 (条件插入)
    async fn register_fingerprint(&self, record: &FingerprintRecord) -> Result<RegisterOutcome, StoreError>;

    async fn lookup_similar(&self, query: &SimilarQuery) -> Result<bool, StoreError>;

    async fn vendor_history(
        &self,
        tenant_id: &str,
        vendor_name: &str,
        window: &LookbackWindow,
    ) -> Result<VendorHistory, StoreError>;

    async fn write_audit(&self, bill_id: &str, action: &str, details: &FraudAssessment) -> Result<(), StoreError>;
}

/// PostgreSQL 实现
pub struct PgBillStore {
    pool: PgPool,
}

impl PgBillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillStore for PgBillStore {
    async fn register_fingerprint(&self, record: &FingerprintRecord) -> Result<RegisterOutcome, StoreError> {
        let inserted = queries::insert_fingerprint_if_absent(&self.pool, record).await?;
        Ok(if inserted {
            RegisterOutcome::Registered
        } else {
            RegisterOutcome::AlreadyPresent
        })
    }

    async fn lookup_similar(&self, query: &SimilarQuery) -> Result<bool, StoreError> {
        Ok(queries::similar_bill_exists(&self.pool, query).await?)
    }

    async fn vendor_history(
        &self,
        tenant_id: &str,
        vendor_name: &str,
        window: &LookbackWindow,
    ) -> Result<VendorHistory, StoreError> {
        let stat = queries::vendor_amount_stat(&self.pool, tenant_id, vendor_name, window).await?;
        let rejected = queries::count_rejected_bills(&self.pool, tenant_id, vendor_name).await?;

        Ok(VendorHistory {
            bill_count: u32::try_from(stat.bill_count).unwrap_or(0),
            average_total: stat.avg_amount,
            rejected_count: u32::try_from(rejected).unwrap_or(0),
        })
    }

    async fn write_audit(&self, bill_id: &str, action: &str, details: &FraudAssessment) -> Result<(), StoreError> {
        let payload = serde_json::to_string(details)?;
        queries::insert_audit(&self.pool, bill_id, action, &payload).await?;
        Ok(())
    }
}
