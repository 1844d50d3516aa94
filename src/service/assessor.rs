use crate::config::ScoringConfig;
use crate::db::BillStore;
use crate::error::IntakeError;
use crate::models::{ExtractedBill, FraudAssessment, RawBill};
use crate::service::scorer::score_signals;
use crate::service::{arithmetic, duplicate, tax_id, vendor_history, with_timeout, CheckReport};
use chrono::Utc;
use std::sync::Arc;

pub const AUDIT_ACTION: &str = "fraud_check";

/// 欺诈检查服务: 校验 -> 评分 -> 审计
pub struct FraudCheckService {
    store: Arc<dyn BillStore>,
    config: ScoringConfig,
}

impl FraudCheckService {
    pub fn new(store: Arc<dyn BillStore>, config: ScoringConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 入库校验后评估; 无法解析的账单返回 IntakeError, 不产生评估
    pub async fn assess_raw(&self, raw: RawBill) -> Result<FraudAssessment, IntakeError> {
        let bill = ExtractedBill::try_from(raw)?;
        Ok(self.assess(&bill).await)
    }

    /// 评估单张账单, 各项检查都返回结果值, 不会中断流程
    pub async fn assess(&self, bill: &ExtractedBill) -> FraudAssessment {
        let config = &self.config;
        let store = self.store.as_ref();
        // 回溯窗口与登记时间只取服务端时间
        let as_of = Utc::now();

        // 1. 纯计算检查
        let tax = tax_id::check_tax_id(bill.tax_id.as_deref(), &config.weights);
        let arithmetic = arithmetic::check_arithmetic(bill, &config.tolerances, &config.weights);

        // 2. 供应商历史须在指纹登记前读取, 避免统计到本账单
        let vendor = vendor_history::check_vendor_history(bill, store, config, as_of).await;

        // 3. 查重 + 登记
        let duplicate = duplicate::check_duplicate(bill, store, config, as_of).await;

        let mut checks = CheckReport::default();
        checks.merge(tax);
        checks.merge(arithmetic);
        checks.merge(duplicate.report);
        checks.merge(vendor);

        let scored = score_signals(&checks.signals);
        let assessment = FraudAssessment {
            bill_id: bill.bill_id.clone(),
            tenant_id: bill.tenant_id.clone(),
            score: scored.score,
            band: scored.band,
            explanation: scored.explanation,
            validations: checks.validations,
            signals: scored.signals,
            duplicate_detected: duplicate.duplicate_detected,
            assessed_at: as_of,
        };

        tracing::info!(
            "Bill {} (tenant {}, project {}) assessed: score {:.2}, band {:?}, {} signal(s)",
            bill.bill_id,
            bill.tenant_id,
            bill.project_id,
            assessment.score,
            assessment.band,
            assessment.signals.len()
        );

        self.spawn_audit(assessment.clone());
        assessment
    }

    /// 后台写审计日志, 失败只记录日志, 不阻塞返回
    fn spawn_audit(&self, assessment: FraudAssessment) {
        let store = Arc::clone(&self.store);
        let timeout_ms = self.config.store_timeout_ms;

        tokio::spawn(async move {
            let result = with_timeout(
                timeout_ms,
                store.write_audit(&assessment.bill_id, AUDIT_ACTION, &assessment),
            )
            .await;

            if let Err(e) = result {
                tracing::warn!("Audit write failed for bill {}: {}", assessment.bill_id, e);
            }
        });
    }
}
