use crate::config::{to_decimal, RiskWeights, ToleranceConfig};
use crate::models::{CheckId, CheckOutcome, ExtractedBill, RiskSignal, SignalKind, ValidationResult};
use crate::service::CheckReport;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};

/// 明细合计与账单总额是否在容差内 (边界值视为通过)
pub fn within_tolerance(computed: &BigDecimal, declared: &BigDecimal, tolerances: &ToleranceConfig) -> bool {
    let diff = (computed - declared).abs();
    diff <= to_decimal(tolerances.absolute) || diff <= to_decimal(tolerances.relative) * declared.abs()
}

/// 合计差异占账单总额的比例; 总额为 0 时视为 100%
pub fn discrepancy_ratio(computed: &BigDecimal, declared: &BigDecimal) -> f64 {
    if declared.is_zero() {
        return 1.0;
    }
    ((computed - declared).abs() / declared.abs())
        .to_f64()
        .unwrap_or(1.0)
}

/// 差异比例线性映射到 [0, sum_mismatch_max]
pub fn mismatch_weight(ratio: f64, weights: &RiskWeights) -> f64 {
    if weights.sum_mismatch_full_ratio <= 0.0 {
        return weights.sum_mismatch_max;
    }
    weights.sum_mismatch_max * (ratio / weights.sum_mismatch_full_ratio).min(1.0)
}

pub fn check_arithmetic(bill: &ExtractedBill, tolerances: &ToleranceConfig, weights: &RiskWeights) -> CheckReport {
    let items = &bill.line_items;
    let declared = &bill.declared_total;
    let mut report = CheckReport::default();

    if items.is_empty() {
        report.validations.push(
            ValidationResult::new(
                CheckId::LineSum,
                CheckOutcome::Failed,
                "no_line_items",
                "bill has no line items, total cannot be verified",
            )
            .with_amounts(BigDecimal::zero(), declared.clone()),
        );
        report.signals.push(RiskSignal::new(
            SignalKind::NoLineItems,
            "No line items to verify the declared total against",
            weights.no_line_items,
        ));
        return report;
    }

    // 1. 明细合计 vs 账单总额
    let computed = bill.line_sum();
    if within_tolerance(&computed, declared, tolerances) {
        report.validations.push(
            ValidationResult::new(
                CheckId::LineSum,
                CheckOutcome::Passed,
                "sum_ok",
                format!("line items sum to {}, declared {}", computed, declared),
            )
            .with_amounts(computed, declared.clone()),
        );
    } else {
        let ratio = discrepancy_ratio(&computed, declared);
        report.validations.push(
            ValidationResult::new(
                CheckId::LineSum,
                CheckOutcome::Failed,
                "sum_mismatch",
                format!(
                    "line items sum to {}, declared {} ({:.1}% discrepancy)",
                    computed,
                    declared,
                    ratio * 100.0
                ),
            )
            .with_amounts(computed.clone(), declared.clone()),
        );
        report.signals.push(RiskSignal::new(
            SignalKind::SumMismatch,
            format!(
                "Line items total {} does not match declared total {} ({:.0}% off)",
                computed,
                declared,
                ratio * 100.0
            ),
            mismatch_weight(ratio, weights),
        ));
    }

    // 2. 逐行 数量×单价 核对, 多行不符只计一个信号
    let line_tolerance = to_decimal(tolerances.line_item);
    let mut inconsistent = 0usize;
    for (idx, item) in items.iter().enumerate() {
        let expected = &item.quantity * &item.rate;
        if (&expected - &item.total).abs() > line_tolerance {
            inconsistent += 1;
            report.validations.push(
                ValidationResult::new(
                    CheckId::LineItem,
                    CheckOutcome::Failed,
                    "line_item_mismatch",
                    format!(
                        "line {} '{}': {} x {} = {}, billed {}",
                        idx + 1,
                        item.name,
                        item.quantity,
                        item.rate,
                        expected,
                        item.total
                    ),
                )
                .with_amounts(expected, item.total.clone()),
            );
        }
    }

    if inconsistent > 0 {
        report.signals.push(RiskSignal::new(
            SignalKind::LineItemInconsistency,
            format!("{} line item(s) with amount mismatch", inconsistent),
            weights.line_item_inconsistency,
        ));
    } else {
        report.validations.push(ValidationResult::new(
            CheckId::LineItem,
            CheckOutcome::Passed,
            "line_items_consistent",
            format!("all {} line items satisfy quantity x rate = total", items.len()),
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fingerprint, LineItem};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn item(qty: &str, rate: &str, total: &str) -> LineItem {
        LineItem {
            name: "item".to_string(),
            quantity: dec(qty),
            rate: dec(rate),
            total: dec(total),
        }
    }

    fn run(items: &[LineItem], declared: &str) -> CheckReport {
        let bill = ExtractedBill {
            bill_id: "B1".to_string(),
            tenant_id: "T1".to_string(),
            project_id: "P1".to_string(),
            vendor_name: "Acme".to_string(),
            tax_id: None,
            line_items: items.to_vec(),
            declared_total: dec(declared),
            fingerprint: Fingerprint::of_document(b"bill"),
        };
        check_arithmetic(&bill, &ToleranceConfig::default(), &RiskWeights::default())
    }

    #[test]
    fn test_sum_ok() {
        let report = run(&[item("10", "5", "50"), item("3", "20", "60")], "110");
        assert!(report.signals.is_empty());
        let sum = &report.validations[0];
        assert_eq!(sum.code, "sum_ok");
        assert_eq!(sum.computed, Some(dec("110")));
        assert_eq!(sum.declared, Some(dec("110")));
    }

    #[test]
    fn test_sum_mismatch_scaled_weight() {
        let report = run(&[item("10", "5", "50"), item("3", "20", "60")], "200");
        assert_eq!(report.validations[0].code, "sum_mismatch");
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].kind, SignalKind::SumMismatch);
        assert!((report.signals[0].weight - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_mismatch_weight_is_capped() {
        let weights = RiskWeights::default();
        assert_eq!(mismatch_weight(0.0, &weights), 0.0);
        assert_eq!(mismatch_weight(0.5, &weights), 40.0);
        assert_eq!(mismatch_weight(3.0, &weights), 40.0);
        assert_eq!(discrepancy_ratio(&dec("10"), &dec("0")), 1.0);
    }

    #[test]
    fn test_absolute_tolerance_boundary() {
        // 差额恰好等于 1.00 通过, 多 0.01 不通过
        assert_eq!(run(&[item("1", "110", "110")], "111").validations[0].code, "sum_ok");
        assert_eq!(run(&[item("1", "110", "110")], "109").validations[0].code, "sum_ok");
        assert_eq!(run(&[item("1", "110", "110")], "111.01").validations[0].code, "sum_mismatch");
    }

    #[test]
    fn test_relative_tolerance_boundary() {
        // 0.1% x 100000 = 100
        let tolerances = ToleranceConfig::default();
        assert!(within_tolerance(&dec("100100"), &dec("100000"), &tolerances));
        assert!(!within_tolerance(&dec("100100.01"), &dec("100000"), &tolerances));
    }

    #[test]
    fn test_no_line_items() {
        let report = run(&[], "500");
        assert_eq!(report.validations.len(), 1);
        assert_eq!(report.validations[0].code, "no_line_items");
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].kind, SignalKind::NoLineItems);
        assert_eq!(report.signals[0].weight, 20.0);
    }

    #[test]
    fn test_line_item_inconsistencies_aggregate_to_one_signal() {
        let items = [item("10", "5", "55"), item("3", "20", "70"), item("2", "2", "4")];
        let report = run(&items, "129");
        let mismatches: Vec<_> = report
            .validations
            .iter()
            .filter(|v| v.code == "line_item_mismatch")
            .collect();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].computed, Some(dec("50")));
        assert_eq!(mismatches[0].declared, Some(dec("55")));

        let line_signals: Vec<_> = report
            .signals
            .iter()
            .filter(|s| s.kind == SignalKind::LineItemInconsistency)
            .collect();
        assert_eq!(line_signals.len(), 1);
        assert_eq!(line_signals[0].weight, 15.0);
        assert!(line_signals[0].reason.starts_with("2 line item(s)"));
    }

    #[test]
    fn test_line_item_within_tolerance() {
        let report = run(&[item("3", "33.33", "100")], "100");
        assert!(report.signals.is_empty());
        assert!(report.validations.iter().any(|v| v.code == "line_items_consistent"));
    }
}
