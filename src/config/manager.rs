//! 配置管理器
//!
//! 查找顺序：`.env` 文件 → 配置文件（TOML / JSON）→ 环境变量覆盖 → 校验

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants;
use crate::env::EnvError;
use crate::parsers::html::Selector;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置失败: {0}")]
    Parse(String),

    #[error("写入配置文件失败: {0}")]
    Write(String),

    #[error("配置无效: {0}")]
    Invalid(String),

    #[error(transparent)]
    Env(#[from] EnvError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 内容发现配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub primary_selectors: Vec<String>,
    pub detail_selectors: Vec<String>,
    pub container_selector: String,
    pub min_text_length: usize,
    pub feed_hosts: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            primary_selectors: to_strings(constants::PRIMARY_SELECTORS),
            detail_selectors: to_strings(constants::DETAIL_SELECTORS),
            container_selector: constants::CONTAINER_SELECTOR.to_string(),
            min_text_length: constants::MIN_TEXT_LENGTH,
            feed_hosts: to_strings(constants::FEED_HOSTS),
        }
    }
}

/// 触发器节奏配置，单位均为毫秒
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub scroll_debounce_ms: u64,
    pub body_mutation_throttle_ms: u64,
    pub container_mutation_throttle_ms: u64,
    pub location_poll_ms: u64,
    pub navigation_first_delay_ms: u64,
    pub navigation_step_ms: u64,
    pub navigation_max_attempts: u32,
    pub detail_startup_delays_ms: Vec<u64>,
    pub periodic_scan_ms: u64,
    pub sweep_interval_ms: u64,
    pub region_refresh_ms: u64,
    pub container_refresh_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            scroll_debounce_ms: millis(constants::SCROLL_DEBOUNCE),
            body_mutation_throttle_ms: millis(constants::BODY_MUTATION_THROTTLE),
            container_mutation_throttle_ms: millis(constants::CONTAINER_MUTATION_THROTTLE),
            location_poll_ms: millis(constants::LOCATION_POLL_INTERVAL),
            navigation_first_delay_ms: millis(constants::NAVIGATION_FIRST_DELAY),
            navigation_step_ms: millis(constants::NAVIGATION_STEP),
            navigation_max_attempts: constants::NAVIGATION_MAX_ATTEMPTS,
            detail_startup_delays_ms: constants::DETAIL_STARTUP_DELAYS_MS.to_vec(),
            periodic_scan_ms: millis(constants::PERIODIC_SCAN_INTERVAL),
            sweep_interval_ms: millis(constants::SWEEP_INTERVAL),
            region_refresh_ms: millis(constants::REGION_REFRESH_INTERVAL),
            container_refresh_ms: millis(constants::CONTAINER_REFRESH_INTERVAL),
        }
    }
}

impl TriggerConfig {
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn body_mutation_throttle(&self) -> Duration {
        Duration::from_millis(self.body_mutation_throttle_ms)
    }

    pub fn container_mutation_throttle(&self) -> Duration {
        Duration::from_millis(self.container_mutation_throttle_ms)
    }

    pub fn location_poll(&self) -> Duration {
        Duration::from_millis(self.location_poll_ms)
    }

    /// 第 `attempt` 次导航重试前的等待时间（从 1 开始）
    pub fn navigation_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::from_millis(self.navigation_first_delay_ms)
        } else {
            Duration::from_millis(self.navigation_step_ms * u64::from(attempt - 1))
        }
    }

    pub fn periodic_scan(&self) -> Duration {
        Duration::from_millis(self.periodic_scan_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn region_refresh(&self) -> Duration {
        Duration::from_millis(self.region_refresh_ms)
    }

    pub fn container_refresh(&self) -> Duration {
        Duration::from_millis(self.container_refresh_ms)
    }
}

/// 按钮生命周期配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AffordanceConfig {
    pub inline_timeout_ms: u64,
    pub popup_timeout_ms: u64,
    pub error_revert_ms: u64,
}

impl Default for AffordanceConfig {
    fn default() -> Self {
        Self {
            inline_timeout_ms: millis(constants::DEFAULT_INLINE_TIMEOUT),
            popup_timeout_ms: millis(constants::DEFAULT_POPUP_TIMEOUT),
            error_revert_ms: millis(constants::DEFAULT_ERROR_REVERT),
        }
    }
}

impl AffordanceConfig {
    pub fn inline_timeout(&self) -> Duration {
        Duration::from_millis(self.inline_timeout_ms)
    }

    pub fn popup_timeout(&self) -> Duration {
        Duration::from_millis(self.popup_timeout_ms)
    }

    pub fn error_revert(&self) -> Duration {
        Duration::from_millis(self.error_revert_ms)
    }
}

/// 维护清理配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub duplicate_threshold: usize,
    pub stale_error_age_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: constants::DUPLICATE_THRESHOLD,
            stale_error_age_ms: millis(constants::DEFAULT_STALE_ERROR_AGE),
        }
    }
}

/// 单个翻译服务端点
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: String,
    pub model: String,
}

impl EndpointConfig {
    fn new(url: &str, model: &str) -> Self {
        Self {
            url: url.to_string(),
            model: model.to_string(),
        }
    }
}

/// 翻译服务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google_free_url: String,
    pub max_tokens: u32,
    pub instruction: String,
    pub deepseek: EndpointConfig,
    pub kimi: EndpointConfig,
    pub openai: EndpointConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google_free_url: constants::GOOGLE_FREE_URL.to_string(),
            max_tokens: constants::MAX_TOKENS,
            instruction: constants::TRANSLATION_INSTRUCTION.to_string(),
            deepseek: EndpointConfig::new(constants::DEEPSEEK_URL, constants::DEEPSEEK_MODEL),
            kimi: EndpointConfig::new(constants::KIMI_URL, constants::KIMI_MODEL),
            openai: EndpointConfig::new(constants::OPENAI_URL, constants::OPENAI_MODEL),
        }
    }
}

/// 跨进程消息配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub retry_attempts: u32,
    pub retry_interval_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            retry_attempts: constants::MESSAGE_RETRY_ATTEMPTS,
            retry_interval_ms: millis(constants::MESSAGE_RETRY_INTERVAL),
        }
    }
}

impl MessagingConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// 引擎完整配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub discovery: DiscoveryConfig,
    pub triggers: TriggerConfig,
    pub affordance: AffordanceConfig,
    pub maintenance: MaintenanceConfig,
    pub providers: ProvidersConfig,
    pub messaging: MessagingConfig,
}

impl EngineConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.discovery.primary_selectors.is_empty() {
            return Err(ConfigError::Invalid("主选择器列表不能为空".to_string()));
        }

        for source in self
            .discovery
            .primary_selectors
            .iter()
            .chain(self.discovery.detail_selectors.iter())
            .chain(std::iter::once(&self.discovery.container_selector))
        {
            Selector::parse(source).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        if self.discovery.min_text_length == 0 {
            return Err(ConfigError::Invalid("最小文本长度不能为0".to_string()));
        }

        let timeouts = [
            ("inline_timeout_ms", self.affordance.inline_timeout_ms),
            ("popup_timeout_ms", self.affordance.popup_timeout_ms),
            ("error_revert_ms", self.affordance.error_revert_ms),
            ("stale_error_age_ms", self.maintenance.stale_error_age_ms),
            ("scroll_debounce_ms", self.triggers.scroll_debounce_ms),
            ("location_poll_ms", self.triggers.location_poll_ms),
            ("periodic_scan_ms", self.triggers.periodic_scan_ms),
            ("sweep_interval_ms", self.triggers.sweep_interval_ms),
            ("region_refresh_ms", self.triggers.region_refresh_ms),
            ("container_refresh_ms", self.triggers.container_refresh_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} 必须大于0", name)));
        }

        if self.maintenance.duplicate_threshold == 0 {
            return Err(ConfigError::Invalid("重复按钮阈值不能为0".to_string()));
        }

        if self.triggers.navigation_max_attempts == 0 {
            return Err(ConfigError::Invalid("导航重试次数不能为0".to_string()));
        }

        if self.messaging.retry_attempts == 0 {
            return Err(ConfigError::Invalid("消息重试次数不能为0".to_string()));
        }

        if self.providers.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens 不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        use crate::env::{timing, EnvVar};

        if timing::InlineTimeout::is_set() {
            self.affordance.inline_timeout_ms = millis(timing::InlineTimeout::get()?);
            tracing::info!("环境变量覆盖行内超时: {}ms", self.affordance.inline_timeout_ms);
        }

        if timing::PopupTimeout::is_set() {
            self.affordance.popup_timeout_ms = millis(timing::PopupTimeout::get()?);
            tracing::info!("环境变量覆盖弹窗超时: {}ms", self.affordance.popup_timeout_ms);
        }

        Ok(())
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: EngineConfig,
}

impl ConfigManager {
    /// 按默认搜索路径创建
    pub fn new() -> ConfigResult<Self> {
        Self::load_dotenv();
        let config = Self::load_config()?;
        Self::finish(config)
    }

    /// 从指定文件创建
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::load_dotenv();
        let config = Self::load_from_file(path.as_ref())?;
        Self::finish(config)
    }

    fn finish(mut config: EngineConfig) -> ConfigResult<Self> {
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(Self { config })
    }

    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    fn load_config() -> ConfigResult<EngineConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(EngineConfig::default())
    }

    /// 从指定文件加载配置，扩展名为 `.toml` 时按 TOML 解析，否则按 JSON
    pub fn load_from_file(path: &Path) -> ConfigResult<EngineConfig> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            toml::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("解析JSON配置失败: {}", e)))
        }
    }

    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(&EngineConfig::default())
            .map_err(|e| ConfigError::Write(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::Write(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
