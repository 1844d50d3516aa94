use crate::error::IntakeError;
use bigdecimal::{BigDecimal, Signed, Zero};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// 文件指纹: 原始文件字节的 SHA-256 (64 位小写十六进制)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const HEX_LEN: usize = 64;

    /// 由上传文件内容计算指纹
    pub fn of_document(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// 解析上游传入的指纹字符串
    pub fn parse(raw: &str) -> Result<Self, IntakeError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.len() != Self::HEX_LEN || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IntakeError::InvalidFingerprint(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 账单明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    pub total: BigDecimal,
}

/// 抽取完成并通过入库校验的账单, 创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedBill {
    pub bill_id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub vendor_name: String,
    pub tax_id: Option<String>,
    pub line_items: Vec<LineItem>,
    pub declared_total: BigDecimal,
    pub fingerprint: Fingerprint,
}

/// 抽取服务返回的原始明细 (字段名兼容多种写法)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLineItem {
    #[serde(default, alias = "item", alias = "description")]
    pub name: Option<String>,
    #[serde(default, alias = "qty")]
    pub quantity: Value,
    #[serde(default, alias = "unit_price", alias = "price")]
    pub rate: Value,
    #[serde(default, alias = "amount", alias = "total_price")]
    pub total: Value,
}

/// 抽取服务返回的原始账单
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBill {
    #[serde(default)]
    pub bill_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, alias = "vendor")]
    pub vendor_name: Option<String>,
    #[serde(default, alias = "gstin", alias = "vendor_gstin")]
    pub tax_id: Option<String>,
    /// 抽取服务可能返回 null
    #[serde(default)]
    pub line_items: Option<Vec<RawLineItem>>,
    #[serde(default, alias = "total", alias = "declared_total")]
    pub total_amount: Value,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl TryFrom<RawBill> for ExtractedBill {
    type Error = IntakeError;

    fn try_from(raw: RawBill) -> Result<Self, Self::Error> {
        let bill_id = required(raw.bill_id, "bill_id")?;
        let tenant_id = required(raw.tenant_id, "tenant_id")?;
        let project_id = required(raw.project_id, "project_id")?;
        let fingerprint = Fingerprint::parse(&required(raw.fingerprint, "fingerprint")?)?;
        let declared_total = parse_amount("total_amount", &raw.total_amount)?;

        let line_items = raw
            .line_items
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, item)| parse_line_item(idx, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bill_id,
            tenant_id,
            project_id,
            vendor_name: raw.vendor_name.map(|v| v.trim().to_string()).unwrap_or_default(),
            tax_id: raw.tax_id,
            line_items,
            declared_total,
            fingerprint,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, IntakeError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(IntakeError::MissingField(field.to_string())),
    }
}

fn parse_line_item(idx: usize, item: RawLineItem) -> Result<LineItem, IntakeError> {
    let field = |name: &str| format!("line_items[{}].{}", idx, name);

    let quantity = parse_amount(&field("quantity"), &item.quantity)?;
    let rate = parse_amount(&field("rate"), &item.rate)?;
    let total = parse_amount(&field("total"), &item.total)?;

    for (name, value) in [("quantity", &quantity), ("rate", &rate)] {
        if value.is_negative() {
            return Err(IntakeError::NegativeAmount {
                field: field(name),
                value: value.to_string(),
            });
        }
    }

    Ok(LineItem {
        name: item.name.unwrap_or_default(),
        quantity,
        rate,
        total,
    })
}

/// 金额统一保留 4 位小数 (与 NUMERIC(20,4) 一致)
pub const AMOUNT_SCALE: i64 = 4;
/// NUMERIC(20,4) 可容纳的最大位数
const MAX_AMOUNT_DIGITS: u64 = 20;
const MAX_AMOUNT_TEXT_LEN: usize = 40;
/// 输入允许的最大指数 (绝对值)
const MAX_INPUT_SCALE: i64 = 18;

/// 解析金额: 接受 JSON 数字或带千分位逗号的字符串, 四舍五入到 4 位小数
pub fn parse_amount(field: &str, value: &Value) -> Result<BigDecimal, IntakeError> {
    let invalid = || IntakeError::InvalidAmount {
        field: field.to_string(),
        value: value.to_string(),
    };

    let text = match value {
        Value::Null => return Err(IntakeError::MissingField(field.to_string())),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect(),
        _ => return Err(invalid()),
    };
    if text.is_empty() || text.len() > MAX_AMOUNT_TEXT_LEN {
        return Err(invalid());
    }

    let parsed = BigDecimal::from_str(&text).map_err(|_| invalid())?;
    // 1e-400000000 之类的指数会让后续运算构造超大整数
    let (_, scale) = parsed.as_bigint_and_exponent();
    if scale.abs() > MAX_INPUT_SCALE {
        return Err(invalid());
    }

    let normalized = parsed.round(AMOUNT_SCALE).with_scale(AMOUNT_SCALE);
    if normalized.digits() > MAX_AMOUNT_DIGITS {
        return Err(invalid());
    }
    Ok(normalized)
}

impl ExtractedBill {
    /// 明细行金额合计
    pub fn line_sum(&self) -> BigDecimal {
        self.line_items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + &item.total)
    }
}
