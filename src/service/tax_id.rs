use crate::config::RiskWeights;
use crate::models::{CheckId, CheckOutcome, RiskSignal, SignalKind, ValidationResult};
use crate::service::CheckReport;
use regex::Regex;
use std::sync::LazyLock;

/// GSTIN 字符表, 校验位按 36 进制计算
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 州代码(2) + PAN(5字母4数字1字母) + 主体序号 + 'Z' + 校验位
static GSTIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<state>[0-9]{2})[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z]Z[0-9A-Z]$")
        .expect("GSTIN pattern is a valid regex")
});

const STATE_CODES: std::ops::RangeInclusive<u32> = 1..=37;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxIdStatus {
    Unavailable,
    InvalidFormat,
    InvalidChecksum,
    Valid,
}

impl TaxIdStatus {
    pub fn code(&self) -> &'static str {
        match self {
            TaxIdStatus::Unavailable => "unavailable",
            TaxIdStatus::InvalidFormat => "invalid_format",
            TaxIdStatus::InvalidChecksum => "invalid_checksum",
            TaxIdStatus::Valid => "valid",
        }
    }
}

/// 计算前 14 位对应的校验字符; 含非法字符时返回 None
pub fn checksum_char(body: &str) -> Option<char> {
    if body.len() != 14 {
        return None;
    }

    let mut sum = 0u32;
    for (idx, byte) in body.bytes().enumerate() {
        let value = ALPHABET.iter().position(|&c| c == byte)? as u32;
        let product = value * (idx as u32 % 2 + 1);
        sum += product / 36 + product % 36;
    }

    Some(ALPHABET[((36 - sum % 36) % 36) as usize] as char)
}

/// 校验 GSTIN 格式与校验位
pub fn validate_gstin(raw: Option<&str>) -> TaxIdStatus {
    let gstin = match raw.map(|s| s.trim().to_ascii_uppercase()) {
        Some(s) if !s.is_empty() => s,
        _ => return TaxIdStatus::Unavailable,
    };

    let Some(caps) = GSTIN_PATTERN.captures(&gstin) else {
        return TaxIdStatus::InvalidFormat;
    };

    let state_ok = caps["state"]
        .parse::<u32>()
        .map(|code| STATE_CODES.contains(&code))
        .unwrap_or(false);
    if !state_ok {
        return TaxIdStatus::InvalidFormat;
    }

    match checksum_char(&gstin[..14]) {
        Some(expected) if gstin.ends_with(expected) => TaxIdStatus::Valid,
        _ => TaxIdStatus::InvalidChecksum,
    }
}

pub fn check_tax_id(raw: Option<&str>, weights: &RiskWeights) -> CheckReport {
    let status = validate_gstin(raw);
    let shown = raw.unwrap_or("").trim();
    let mut report = CheckReport::default();

    let (outcome, detail) = match status {
        TaxIdStatus::Unavailable => (CheckOutcome::Unavailable, "tax ID not present, not checked".to_string()),
        TaxIdStatus::Valid => (CheckOutcome::Passed, format!("GSTIN {} is valid", shown)),
        TaxIdStatus::InvalidFormat => {
            report.signals.push(RiskSignal::new(
                SignalKind::InvalidTaxIdFormat,
                format!("GSTIN '{}' does not match the expected format", shown),
                weights.invalid_tax_id_format,
            ));
            (CheckOutcome::Failed, "expected state code + PAN + entity + 'Z' + checksum".to_string())
        }
        TaxIdStatus::InvalidChecksum => {
            report.signals.push(RiskSignal::new(
                SignalKind::InvalidTaxIdChecksum,
                format!("GSTIN '{}' has an invalid checksum character", shown),
                weights.invalid_tax_id_checksum,
            ));
            (CheckOutcome::Failed, "checksum character does not match".to_string())
        }
    };

    report
        .validations
        .push(ValidationResult::new(CheckId::TaxId, outcome, status.code(), detail));
    report
}
