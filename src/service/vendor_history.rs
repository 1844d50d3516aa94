use crate::config::ScoringConfig;
use crate::db::{BillStore, LookbackWindow, VendorHistory};
use crate::models::{CheckId, CheckOutcome, ExtractedBill, RiskSignal, SignalKind, ValidationResult};
use crate::service::{with_timeout, CheckReport};
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::{DateTime, Utc};

/// 查询供应商历史并评估 (须在本账单登记指纹之前调用)
pub async fn check_vendor_history(
    bill: &ExtractedBill,
    store: &dyn BillStore,
    config: &ScoringConfig,
    as_of: DateTime<Utc>,
) -> CheckReport {
    if bill.vendor_name.is_empty() {
        let mut report = CheckReport::default();
        report.validations.push(ValidationResult::new(
            CheckId::VendorHistory,
            CheckOutcome::Unavailable,
            "unavailable",
            "vendor name not present, not checked",
        ));
        return report;
    }

    let window = LookbackWindow::ending_at(as_of, config.vendor.lookback_days);
    match with_timeout(
        config.store_timeout_ms,
        store.vendor_history(&bill.tenant_id, &bill.vendor_name, &window),
    )
    .await
    {
        Ok(history) => evaluate_vendor_history(&bill.vendor_name, &bill.declared_total, &history, config),
        Err(e) => {
            tracing::warn!("Vendor history unavailable for bill {}: {}", bill.bill_id, e);
            let mut report = CheckReport::default();
            report.validations.push(ValidationResult::new(
                CheckId::VendorHistory,
                CheckOutcome::Unavailable,
                "unavailable",
                e.to_string(),
            ));
            report
        }
    }
}

/// 金额异常 + 驳回历史 (纯函数)
pub fn evaluate_vendor_history(
    vendor: &str,
    total: &BigDecimal,
    history: &VendorHistory,
    config: &ScoringConfig,
) -> CheckReport {
    let rules = &config.vendor;
    let weights = &config.weights;
    let mut report = CheckReport::default();

    // 1. 金额高于近期均值
    if history.bill_count > rules.min_history {
        if let Some(avg) = history.average_total.as_ref().filter(|a| **a > BigDecimal::zero()) {
            let avg_f = avg.to_f64().unwrap_or(0.0);
            let total_f = total.to_f64().unwrap_or(0.0);
            if avg_f > 0.0 && total_f > avg_f * rules.anomaly_multiplier {
                let deviation = (total_f - avg_f) / avg_f * 100.0;
                report.validations.push(
                    ValidationResult::new(
                        CheckId::VendorHistory,
                        CheckOutcome::Failed,
                        "amount_anomaly",
                        format!(
                            "total is {:.0}% above the {}-bill average for {}",
                            deviation, history.bill_count, vendor
                        ),
                    )
                    .with_amounts(total.clone(), avg.clone()),
                );
                report.signals.push(RiskSignal::new(
                    SignalKind::AmountAnomaly,
                    format!("Amount {:.0}% above average for {}", deviation, vendor),
                    (10.0 + deviation / 50.0).min(weights.amount_anomaly_cap),
                ));
            }
        }
    }

    // 2. 供应商驳回记录
    if history.rejected_count > rules.rejection_threshold {
        let rejected = history.rejected_count;
        report.validations.push(ValidationResult::new(
            CheckId::VendorHistory,
            CheckOutcome::Failed,
            "vendor_rejections",
            format!("{} has {} rejected bills", vendor, rejected),
        ));
        report.signals.push(RiskSignal::new(
            SignalKind::VendorRejections,
            format!("Vendor has {} rejected bills", rejected),
            (5.0 + 2.0 * rejected as f64).min(weights.vendor_rejections_cap),
        ));
    }

    if report.validations.is_empty() {
        report.validations.push(ValidationResult::new(
            CheckId::VendorHistory,
            CheckOutcome::Passed,
            "vendor_history_ok",
            format!("{} prior bills, {} rejected", history.bill_count, history.rejected_count),
        ));
    }

    report
}
