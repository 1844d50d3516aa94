use crate::models::{CheckOutcome, FraudAssessment, RawBill, RiskSignal, ValidationResult};
use crate::service::{tax_id, FraudCheckService};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 请求体: 批量账单
#[derive(Debug, Deserialize)]
pub struct BatchVerifyRequest {
    pub bills: Vec<RawBill>,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    pub assessment: Option<FraudAssessment>,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub assessment: Option<FraudAssessment>,
    pub error: Option<String>,
}

/// 批量响应体 (逐张返回结果或入库错误)
#[derive(Debug, Serialize)]
pub struct BatchVerifyResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<BatchItemResult>,
}

/// 税号校验响应体
#[derive(Debug, Serialize)]
pub struct TaxIdResponse {
    pub success: bool,
    pub message: String,
    pub validation: Option<ValidationResult>,
    pub signals: Vec<RiskSignal>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 单张账单欺诈检查
pub async fn verify_bill(
    State(service): State<Arc<FraudCheckService>>,
    Json(raw): Json<RawBill>,
) -> Response {
    match service.assess_raw(raw).await {
        Ok(assessment) => {
            let response = VerifyResponse {
                success: true,
                message: format!(
                    "Bill {} scored {:.2} ({:?})",
                    assessment.bill_id, assessment.score, assessment.band
                ),
                assessment: Some(assessment),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::warn!("Rejected bill at intake: {}", e);
            let response = VerifyResponse {
                success: false,
                message: format!("Invalid bill: {}", e),
                assessment: None,
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(response)).into_response()
        }
    }
}

/// 批量欺诈检查, 按提交顺序逐张处理
pub async fn verify_batch(
    State(service): State<Arc<FraudCheckService>>,
    Json(req): Json<BatchVerifyRequest>,
) -> Response {
    let total = req.bills.len();
    let mut results = Vec::with_capacity(total);

    for (index, raw) in req.bills.into_iter().enumerate() {
        let item = match service.assess_raw(raw).await {
            Ok(assessment) => BatchItemResult {
                index,
                assessment: Some(assessment),
                error: None,
            },
            Err(e) => BatchItemResult {
                index,
                assessment: None,
                error: Some(e.to_string()),
            },
        };
        results.push(item);
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let response = BatchVerifyResponse {
        success: failed == 0,
        message: format!("Assessed {} of {} bills, {} rejected at intake", total - failed, total, failed),
        results,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 单独校验 GSTIN, 不登记指纹也不写审计
pub async fn verify_tax_id(
    State(service): State<Arc<FraudCheckService>>,
    Path(gstin): Path<String>,
) -> Response {
    let report = tax_id::check_tax_id(Some(&gstin), &service.config().weights);
    let validation = report.validations.into_iter().next();
    let (success, code) = match &validation {
        Some(v) => (v.outcome == CheckOutcome::Passed, v.code.clone()),
        None => (false, "unavailable".to_string()),
    };

    let response = TaxIdResponse {
        success,
        message: format!("GSTIN {}: {}", gstin.trim(), code),
        validation,
        signals: report.signals,
    };
    (StatusCode::OK, Json(response)).into_response()
}
