use crate::models::{RiskBand, RiskSignal};

pub const MAX_SCORE: f64 = 100.0;

/// 评分结果
#[derive(Debug, Clone, PartialEq)]
pub struct RiskScore {
    pub score: f64,
    pub band: RiskBand,
    /// 按信号类别固定排序的解释文本
    pub explanation: Vec<String>,
    pub signals: Vec<RiskSignal>,
}

/// 风险分 = 信号权重之和, 截断到 [0, 100], 保留两位小数
pub fn score_signals(signals: &[RiskSignal]) -> RiskScore {
    let mut ordered = signals.to_vec();
    // 稳定排序: 同类信号保持产生顺序
    ordered.sort_by_key(|s| s.kind);

    let total: f64 = ordered.iter().map(|s| s.weight).sum();
    let score = (total.clamp(0.0, MAX_SCORE) * 100.0).round() / 100.0;

    RiskScore {
        score,
        band: RiskBand::from_score(score),
        explanation: ordered.iter().map(|s| s.reason.clone()).collect(),
        signals: ordered,
    }
}
