use thiserror::Error;

/// 入库校验错误: 账单无法解析, 尚不构成欺诈评估
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("field {field} is not a valid amount: {value}")]
    InvalidAmount { field: String, value: String },

    #[error("field {field} must not be negative: {value}")]
    NegativeAmount { field: String, value: String },

    #[error("malformed document fingerprint: {0}")]
    InvalidFingerprint(String),
}

/// 持久化协作方错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    #[error("failed to serialize audit details: {0}")]
    Serialization(#[from] serde_json::Error),
}
