pub mod arithmetic;
pub mod assessor;
pub mod duplicate;
pub mod scorer;
pub mod tax_id;
pub mod vendor_history;

pub use assessor::FraudCheckService;

use crate::error::StoreError;
use crate::models::{RiskSignal, ValidationResult};
use std::future::Future;
use std::time::Duration;

/// 单项检查的输出: 校验结果 + 触发的风险信号
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub validations: Vec<ValidationResult>,
    pub signals: Vec<RiskSignal>,
}

impl CheckReport {
    pub fn merge(&mut self, other: CheckReport) {
        self.validations.extend(other.validations);
        self.signals.extend(other.signals);
    }
}

/// 存储调用统一加超时
pub(crate) async fn with_timeout<T, F>(timeout_ms: u64, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout_ms)),
    }
}
