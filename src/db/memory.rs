use crate::db::store::{BillStore, FingerprintRecord, LookbackWindow, RegisterOutcome, SimilarQuery, VendorHistory};
use crate::error::StoreError;
use crate::models::{FraudAssessment, Fingerprint};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// 审计日志条目
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub details: String,
    pub written_at: DateTime<Utc>,
}

/// 内存实现 (未配置数据库时及测试使用)
#[derive(Debug, Default)]
pub struct MemoryBillStore {
    /// (租户, 指纹) -> 登记记录
    fingerprints: DashMap<(String, Fingerprint), FingerprintRecord>,
    /// (租户, 小写供应商名) -> 驳回次数
    rejections: DashMap<(String, String), u32>,
    audit: DashMap<String, Vec<AuditEntry>>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 审批流程驳回账单时调用
    pub fn record_rejection(&self, tenant_id: &str, vendor_name: &str) {
        *self
            .rejections
            .entry((tenant_id.to_string(), vendor_name.to_lowercase()))
            .or_insert(0) += 1;
    }

    pub fn audit_entries(&self, bill_id: &str) -> Vec<AuditEntry> {
        self.audit.get(bill_id).map(|e| e.value().clone()).unwrap_or_default()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.fingerprints.len()
    }

    fn same_vendor(record: &FingerprintRecord, tenant_id: &str, vendor_name: &str) -> bool {
        record.tenant_id == tenant_id && record.vendor_name.eq_ignore_ascii_case(vendor_name)
    }
}

#[async_trait]
impl BillStore for MemoryBillStore {
    async fn register_fingerprint(&self, record: &FingerprintRecord) -> Result<RegisterOutcome, StoreError> {
        // entry() 持有分片写锁, 查询与插入在同一临界区内完成
        match self
            .fingerprints
            .entry((record.tenant_id.clone(), record.fingerprint.clone()))
        {
            Entry::Occupied(_) => Ok(RegisterOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(RegisterOutcome::Registered)
            }
        }
    }

    async fn lookup_similar(&self, query: &SimilarQuery) -> Result<bool, StoreError> {
        Ok(self.fingerprints.iter().any(|entry| {
            let record = entry.value();
            Self::same_vendor(record, &query.tenant_id, &query.vendor_name)
                && query.window.contains(record.recorded_at)
                && (&record.total - &query.total).abs() <= query.tolerance
        }))
    }

    async fn vendor_history(
        &self,
        tenant_id: &str,
        vendor_name: &str,
        window: &LookbackWindow,
    ) -> Result<VendorHistory, StoreError> {
        let mut bill_count = 0u32;
        let mut sum = BigDecimal::zero();
        for entry in self.fingerprints.iter() {
            let record = entry.value();
            if Self::same_vendor(record, tenant_id, vendor_name) && window.contains(record.recorded_at) {
                bill_count += 1;
                sum += &record.total;
            }
        }

        let rejected_count = self
            .rejections
            .get(&(tenant_id.to_string(), vendor_name.to_lowercase()))
            .map(|r| *r.value())
            .unwrap_or(0);

        Ok(VendorHistory {
            bill_count,
            average_total: (bill_count > 0).then(|| sum / BigDecimal::from(bill_count)),
            rejected_count,
        })
    }

    async fn write_audit(&self, bill_id: &str, action: &str, details: &FraudAssessment) -> Result<(), StoreError> {
        let entry = AuditEntry {
            action: action.to_string(),
            details: serde_json::to_string(details)?,
            written_at: Utc::now(),
        };
        self.audit.entry(bill_id.to_string()).or_default().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(tenant: &str, doc: &[u8], vendor: &str, total: i64) -> FingerprintRecord {
        FingerprintRecord {
            tenant_id: tenant.to_string(),
            fingerprint: Fingerprint::of_document(doc),
            bill_id: format!("bill-{}", total),
            vendor_name: vendor.to_string(),
            total: BigDecimal::from(total),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_is_test_and_set() {
        let store = MemoryBillStore::new();
        let rec = record("T1", b"doc", "Acme", 100);
        assert_eq!(store.register_fingerprint(&rec).await.unwrap(), RegisterOutcome::Registered);
        assert_eq!(store.register_fingerprint(&rec).await.unwrap(), RegisterOutcome::AlreadyPresent);
        assert_eq!(store.fingerprint_count(), 1);
    }

    #[tokio::test]
    async fn test_fingerprints_are_scoped_by_tenant() {
        let store = MemoryBillStore::new();
        let a = record("T1", b"doc", "Acme", 100);
        let b = record("T2", b"doc", "Acme", 100);
        assert_eq!(store.register_fingerprint(&a).await.unwrap(), RegisterOutcome::Registered);
        assert_eq!(store.register_fingerprint(&b).await.unwrap(), RegisterOutcome::Registered);
    }

    #[tokio::test]
    async fn test_lookup_similar_respects_vendor_amount_and_window() {
        let store = MemoryBillStore::new();
        let mut old = record("T1", b"old", "Acme", 1000);
        old.recorded_at = Utc::now() - Duration::days(30);
        store.register_fingerprint(&old).await.unwrap();
        store.register_fingerprint(&record("T1", b"new", "Acme", 1000)).await.unwrap();

        let query = |vendor: &str, total: i64, days: i64| SimilarQuery {
            tenant_id: "T1".to_string(),
            vendor_name: vendor.to_string(),
            total: BigDecimal::from(total),
            tolerance: BigDecimal::from(50),
            window: LookbackWindow::ending_at(Utc::now(), days),
        };

        assert!(store.lookup_similar(&query("ACME", 1040, 7)).await.unwrap());
        assert!(!store.lookup_similar(&query("Acme", 1100, 7)).await.unwrap());
        assert!(!store.lookup_similar(&query("Other", 1000, 7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_after_as_of_time_are_outside_window() {
        let store = MemoryBillStore::new();
        let mut future = record("T1", b"future", "Acme", 1000);
        future.recorded_at = Utc::now() + Duration::days(365);
        store.register_fingerprint(&future).await.unwrap();

        let query = SimilarQuery {
            tenant_id: "T1".to_string(),
            vendor_name: "Acme".to_string(),
            total: BigDecimal::from(1000),
            tolerance: BigDecimal::from(50),
            window: LookbackWindow::ending_at(Utc::now(), 7),
        };
        assert!(!store.lookup_similar(&query).await.unwrap());

        let history = store
            .vendor_history("T1", "Acme", &LookbackWindow::ending_at(Utc::now(), 30))
            .await
            .unwrap();
        assert_eq!(history.bill_count, 0);
    }

    #[tokio::test]
    async fn test_vendor_history_average_and_rejections() {
        let store = MemoryBillStore::new();
        store.register_fingerprint(&record("T1", b"a", "Acme", 100)).await.unwrap();
        store.register_fingerprint(&record("T1", b"b", "Acme", 300)).await.unwrap();
        store.record_rejection("T1", "ACME");

        let history = store
            .vendor_history("T1", "acme", &LookbackWindow::ending_at(Utc::now(), 30))
            .await
            .unwrap();
        assert_eq!(history.bill_count, 2);
        assert_eq!(history.average_total, Some(BigDecimal::from(200)));
        assert_eq!(history.rejected_count, 1);
    }
}
