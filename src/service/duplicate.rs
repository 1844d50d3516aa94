use crate::config::{to_decimal, ScoringConfig};
use crate::db::{BillStore, FingerprintRecord, LookbackWindow, RegisterOutcome, SimilarQuery};
use crate::models::{CheckId, CheckOutcome, ExtractedBill, RiskSignal, SignalKind, ValidationResult};
use crate::service::{with_timeout, CheckReport};
use chrono::{DateTime, Utc};

/// 查重结果; duplicate_detected 为 None 表示查重服务不可用
#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub report: CheckReport,
    pub duplicate_detected: Option<bool>,
}

/// 查重并登记指纹
///
/// 先按供应商+金额查询此前的账单, 再用条件插入登记指纹:
/// 插入失败(已存在)即为同文件重复, 每张账单只登记一次且不会匹配到自身.
/// as_of 为服务端评估时间, 同时作为登记时间和回溯窗口终点.
pub async fn check_duplicate(
    bill: &ExtractedBill,
    store: &dyn BillStore,
    config: &ScoringConfig,
    as_of: DateTime<Utc>,
) -> DuplicateCheck {
    let timeout_ms = config.store_timeout_ms;
    let weights = &config.weights;

    // 1. 相似账单 (重新扫描/导出的同一张账单)
    let similar = if bill.vendor_name.is_empty() {
        Ok(false)
    } else {
        let query = SimilarQuery {
            tenant_id: bill.tenant_id.clone(),
            vendor_name: bill.vendor_name.clone(),
            total: bill.declared_total.clone(),
            tolerance: to_decimal(config.duplicate.similar_amount_tolerance) * bill.declared_total.abs(),
            window: LookbackWindow::ending_at(as_of, config.duplicate.lookback_days),
        };
        with_timeout(timeout_ms, store.lookup_similar(&query)).await
    };

    // 2. 原子登记指纹
    let record = FingerprintRecord {
        tenant_id: bill.tenant_id.clone(),
        fingerprint: bill.fingerprint.clone(),
        bill_id: bill.bill_id.clone(),
        vendor_name: bill.vendor_name.clone(),
        total: bill.declared_total.clone(),
        recorded_at: as_of,
    };
    let registered = with_timeout(timeout_ms, store.register_fingerprint(&record)).await;

    let mut report = CheckReport::default();
    let duplicate_detected = match (registered, similar) {
        (Ok(RegisterOutcome::AlreadyPresent), _) => {
            report.validations.push(ValidationResult::new(
                CheckId::Duplicate,
                CheckOutcome::Failed,
                "exact_file_match",
                format!("file {} was already submitted for tenant {}", bill.fingerprint, bill.tenant_id),
            ));
            report.signals.push(RiskSignal::new(
                SignalKind::ExactDuplicate,
                "Same file was already uploaded for this tenant",
                weights.exact_duplicate,
            ));
            Some(true)
        }
        (Ok(RegisterOutcome::Registered), Ok(true)) => {
            report.validations.push(ValidationResult::new(
                CheckId::Duplicate,
                CheckOutcome::Failed,
                "similar_bill_match",
                format!(
                    "a bill from {} with a similar total was recorded in the last {} days",
                    bill.vendor_name, config.duplicate.lookback_days
                ),
            ));
            report.signals.push(RiskSignal::new(
                SignalKind::SimilarDuplicate,
                format!(
                    "Similar bill from {} found in last {} days",
                    bill.vendor_name, config.duplicate.lookback_days
                ),
                weights.similar_duplicate,
            ));
            Some(true)
        }
        (Ok(RegisterOutcome::Registered), Ok(false)) => {
            report.validations.push(ValidationResult::new(
                CheckId::Duplicate,
                CheckOutcome::Passed,
                "no_duplicate",
                "no matching file or similar bill found",
            ));
            Some(false)
        }
        (Ok(RegisterOutcome::Registered), Err(e)) | (Err(e), _) => {
            tracing::warn!("Duplicate check unavailable for bill {}: {}", bill.bill_id, e);
            report.validations.push(ValidationResult::new(
                CheckId::Duplicate,
                CheckOutcome::Unavailable,
                "duplicate_check_unavailable",
                e.to_string(),
            ));
            report.signals.push(RiskSignal::new(
                SignalKind::DuplicateCheckUnavailable,
                "Duplicate check unavailable",
                weights.duplicate_check_unavailable,
            ));
            None
        }
    };

    DuplicateCheck {
        report,
        duplicate_detected,
    }
}
