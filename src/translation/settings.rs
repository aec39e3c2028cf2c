//! 用户设置
//!
//! 设置由选项页或侧栏写入，引擎每次操作只读取一份不可变快照。

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use super::providers::ProviderKind;
use crate::env::{translation, EnvConfig, EnvError, EnvResult, EnvVar};

/// 一次操作使用的设置快照，字段名与扩展存储中的键一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub active_ai_provider: Option<ProviderKind>,
    #[serde(default)]
    pub deepseek_api_key: Option<String>,
    #[serde(default)]
    pub kimi_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_enabled")]
    pub translation_enabled: bool,
    #[serde(default)]
    pub flomo_api: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_ai_provider: None,
            deepseek_api_key: None,
            kimi_api_key: None,
            openai_api_key: None,
            translation_enabled: true,
            flomo_api: None,
        }
    }
}

/// 调用翻译管线所需的服务配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub enabled: bool,
}

impl Settings {
    /// 从环境变量构造
    pub fn from_env(env: &EnvConfig) -> EnvResult<Self> {
        let active_ai_provider = env
            .active_provider
            .as_deref()
            .map(str::parse::<ProviderKind>)
            .transpose()
            .map_err(|e| EnvError {
                variable: translation::ActiveProvider::NAME.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            active_ai_provider,
            deepseek_api_key: env.deepseek_api_key.clone(),
            kimi_api_key: env.kimi_api_key.clone(),
            openai_api_key: env.openai_api_key.clone(),
            translation_enabled: env.translation_enabled,
            flomo_api: env.flomo_api.clone(),
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.active_ai_provider.unwrap_or_default()
    }

    /// 指定服务的非空密钥
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::Deepseek => self.deepseek_api_key.as_deref(),
            ProviderKind::Kimi => self.kimi_api_key.as_deref(),
            ProviderKind::Openai => self.openai_api_key.as_deref(),
            ProviderKind::GoogleFree => None,
        };
        key.map(str::trim).filter(|key| !key.is_empty())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let kind = self.provider();
        ProviderConfig {
            kind,
            api_key: self.api_key_for(kind).map(str::to_string),
            enabled: self.translation_enabled,
        }
    }

    pub fn note_endpoint(&self) -> Option<&str> {
        self.flomo_api
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// 只读的设置来源
pub trait SettingsStore {
    fn snapshot(&self) -> Settings;
}

/// 内存中的设置，宿主可以随时替换
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RefCell<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RefCell::new(settings),
        }
    }

    /// 由宿主（选项页）调用
    pub fn replace(&self, settings: Settings) {
        *self.settings.borrow_mut() = settings;
    }
}

impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Settings {
        self.settings.borrow().clone()
    }
}
