use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 校验项标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    TaxId,
    LineSum,
    LineItem,
    Duplicate,
    VendorHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// 输入缺失或协作方不可用, 未能检查
    Unavailable,
}

/// 单项校验结果, 创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub check: CheckId,
    pub outcome: CheckOutcome,
    /// 机器可读结果码, 如 valid / invalid_checksum / sum_ok / exact_file_match
    pub code: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared: Option<BigDecimal>,
}

impl ValidationResult {
    pub fn new(check: CheckId, outcome: CheckOutcome, code: &str, detail: impl Into<String>) -> Self {
        Self {
            check,
            outcome,
            code: code.to_string(),
            detail: detail.into(),
            computed: None,
            declared: None,
        }
    }

    pub fn with_amounts(mut self, computed: BigDecimal, declared: BigDecimal) -> Self {
        self.computed = Some(computed);
        self.declared = Some(declared);
        self
    }
}

/// 风险信号类别, 声明顺序即解释文本的输出顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    InvalidTaxIdFormat,
    InvalidTaxIdChecksum,
    NoLineItems,
    SumMismatch,
    LineItemInconsistency,
    ExactDuplicate,
    SimilarDuplicate,
    DuplicateCheckUnavailable,
    AmountAnomaly,
    VendorRejections,
}

/// 风险信号: (原因, 权重), 权重累加为风险分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub kind: SignalKind,
    pub reason: String,
    pub weight: f64,
}

impl RiskSignal {
    /// 权重不允许为负, 保证评分单调
    pub fn new(kind: SignalKind, reason: impl Into<String>, weight: f64) -> Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        Self {
            kind,
            reason: reason.into(),
            weight,
        }
    }
}

/// 风险等级, 仅用于展示, 以分数为准
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskBand::High
        } else if score >= 30.0 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

/// 欺诈评估结果 (每次上传生成一次, 写入审计日志)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub bill_id: String,
    pub tenant_id: String,
    pub score: f64,
    pub band: RiskBand,
    pub explanation: Vec<String>,
    pub validations: Vec<ValidationResult>,
    pub signals: Vec<RiskSignal>,
    /// None 表示查重服务不可用
    pub duplicate_detected: Option<bool>,
    pub assessed_at: DateTime<Utc>,
}

impl FraudAssessment {
    pub fn validation(&self, check: CheckId) -> Option<&ValidationResult> {
        self.validations.iter().find(|v| v.check == check)
    }
}
