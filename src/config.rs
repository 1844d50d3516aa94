use bigdecimal::BigDecimal;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 未配置 url 时使用内存指纹库
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// 评分配置: 权重表 + 容差 + 查重窗口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: RiskWeights,
    pub tolerances: ToleranceConfig,
    pub duplicate: DuplicateConfig,
    pub vendor: VendorHistoryConfig,
    /// 单次存储调用超时 (毫秒)
    pub store_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            tolerances: ToleranceConfig::default(),
            duplicate: DuplicateConfig::default(),
            vendor: VendorHistoryConfig::default(),
            store_timeout_ms: 5000,
        }
    }
}

/// 风险权重表, 每项对应一种风险信号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    /// 税号结构不合法
    pub invalid_tax_id_format: f64,
    /// 税号校验位不匹配
    pub invalid_tax_id_checksum: f64,
    /// 合计不符时的最大权重, 按差异比例线性缩放
    pub sum_mismatch_max: f64,
    /// 差异比例达到该值时取满权重
    pub sum_mismatch_full_ratio: f64,
    /// 没有明细行, 无法核对
    pub no_line_items: f64,
    /// 存在 数量×单价≠行金额 的明细 (整张账单只计一次)
    pub line_item_inconsistency: f64,
    /// 同一文件重复上传
    pub exact_duplicate: f64,
    /// 同供应商、相近金额的近期账单
    pub similar_duplicate: f64,
    /// 查重服务不可用 (仅提示)
    pub duplicate_check_unavailable: f64,
    /// 金额异常的权重上限
    pub amount_anomaly_cap: f64,
    /// 供应商驳回历史的权重上限
    pub vendor_rejections_cap: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            invalid_tax_id_format: 30.0,
            invalid_tax_id_checksum: 30.0,
            sum_mismatch_max: 40.0,
            sum_mismatch_full_ratio: 0.5,
            no_line_items: 20.0,
            line_item_inconsistency: 15.0,
            exact_duplicate: 100.0,
            similar_duplicate: 50.0,
            duplicate_check_unavailable: 5.0,
            amount_anomaly_cap: 20.0,
            vendor_rejections_cap: 15.0,
        }
    }
}

/// 金额比较容差
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// 明细合计与账单总额的绝对容差
    pub absolute: f64,
    /// 相对账单总额的容差比例
    pub relative: f64,
    /// 单行 数量×单价 与行金额的绝对容差
    pub line_item: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            absolute: 1.0,
            relative: 0.001,
            line_item: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// 相似账单金额容差 (相对当前账单总额)
    pub similar_amount_tolerance: f64,
    pub lookback_days: i64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            similar_amount_tolerance: 0.05,
            lookback_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorHistoryConfig {
    pub lookback_days: i64,
    /// 历史账单数超过该值才做金额异常判断
    pub min_history: u32,
    /// 超过历史均值的倍数视为异常
    pub anomaly_multiplier: f64,
    /// 驳回账单数超过该值才计入风险
    pub rejection_threshold: u32,
}

impl Default for VendorHistoryConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            min_history: 2,
            anomaly_multiplier: 1.5,
            rejection_threshold: 2,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置, 失败时回退到默认值
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid configuration ({}), falling back to defaults", e);
                Self::default().with_legacy_env()
            }
        }
    }

    /// 默认值 < BILLCHECK__* 环境变量 < DATABASE_URL / SERVER_HOST / SERVER_PORT
    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(
                Environment::with_prefix("BILLCHECK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config.with_legacy_env())
    }

    fn with_legacy_env(mut self) -> Self {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        self
    }
}

/// 配置中的浮点容差转为十进制参与金额比较 (按最短十进制表示转换, 0.001 即 0.001)
pub(crate) fn to_decimal(value: f64) -> BigDecimal {
    value.to_string().parse().unwrap_or_default()
}
