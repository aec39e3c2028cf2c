//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量都以 `TWEET_TRANSLATOR_` 为前缀

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => match Self::DEFAULT {
                Some(default) => Ok(default),
                None => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Required environment variable not set".to_string(),
                }),
            },
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }

    /// 变量是否被显式设置
    fn is_set() -> bool {
        env::var(Self::NAME).is_ok()
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TWEET_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译设置相关环境变量
pub mod translation {
    use super::*;

    /// 当前使用的翻译服务
    pub struct ActiveProvider;
    impl EnvVar<String> for ActiveProvider {
        const NAME: &'static str = "TWEET_TRANSLATOR_ACTIVE_PROVIDER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Translation provider: deepseek, kimi, openai, google-free";

        fn parse(value: &str) -> EnvResult<String> {
            let provider = value.trim().to_lowercase();
            match provider.as_str() {
                "deepseek" | "kimi" | "openai" | "google-free" => Ok(provider),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Unknown provider '{}'. Use: deepseek, kimi, openai, google-free",
                        value
                    ),
                }),
            }
        }
    }

    /// Deepseek API 密钥
    pub struct DeepseekApiKey;
    impl EnvVar<String> for DeepseekApiKey {
        const NAME: &'static str = "TWEET_TRANSLATOR_DEEPSEEK_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the deepseek provider";

        fn parse(value: &str) -> EnvResult<String> {
            parse_secret(value, Self::NAME)
        }
    }

    /// Kimi API 密钥
    pub struct KimiApiKey;
    impl EnvVar<String> for KimiApiKey {
        const NAME: &'static str = "TWEET_TRANSLATOR_KIMI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the kimi provider";

        fn parse(value: &str) -> EnvResult<String> {
            parse_secret(value, Self::NAME)
        }
    }

    /// OpenAI API 密钥
    pub struct OpenaiApiKey;
    impl EnvVar<String> for OpenaiApiKey {
        const NAME: &'static str = "TWEET_TRANSLATOR_OPENAI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the openai provider";

        fn parse(value: &str) -> EnvResult<String> {
            parse_secret(value, Self::NAME)
        }
    }

    /// 翻译功能启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "TWEET_TRANSLATOR_TRANSLATION_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable translation functionality";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// Flomo 接口地址
    pub struct FlomoApi;
    impl EnvVar<String> for FlomoApi {
        const NAME: &'static str = "TWEET_TRANSLATOR_FLOMO_API";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Flomo webhook URL used by the save-to-notes button";

        fn parse(value: &str) -> EnvResult<String> {
            let value = value.trim();
            match url::Url::parse(value) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(value.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid URL '{}'. Must be http or https", value),
                }),
            }
        }
    }
}

/// 超时相关环境变量
pub mod timing {
    use super::*;

    /// 行内翻译按钮超时
    pub struct InlineTimeout;
    impl EnvVar<Duration> for InlineTimeout {
        const NAME: &'static str = "TWEET_TRANSLATOR_INLINE_TIMEOUT_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(10_000));
        const DESCRIPTION: &'static str = "Timeout for inline translate buttons in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME)
        }
    }

    /// 划词翻译弹窗超时
    pub struct PopupTimeout;
    impl EnvVar<Duration> for PopupTimeout {
        const NAME: &'static str = "TWEET_TRANSLATOR_POPUP_TIMEOUT_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(15_000));
        const DESCRIPTION: &'static str = "Timeout for the selection popup in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME)
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_secret(value: &str, var_name: &str) -> EnvResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Secret must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

fn parse_millis(value: &str, var_name: &str) -> EnvResult<Duration> {
    let millis: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of milliseconds".to_string(),
    })?;

    if millis == 0 {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }

    if millis > 120_000 {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Timeout too long (max 120000 milliseconds)".to_string(),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,

    pub active_provider: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub kimi_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub translation_enabled: bool,
    pub flomo_api: Option<String>,

    pub inline_timeout: Duration,
    pub popup_timeout: Duration,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,

            active_provider: optional::<translation::ActiveProvider, _>()?,
            deepseek_api_key: optional::<translation::DeepseekApiKey, _>()?,
            kimi_api_key: optional::<translation::KimiApiKey, _>()?,
            openai_api_key: optional::<translation::OpenaiApiKey, _>()?,
            translation_enabled: translation::Enabled::get()?,
            flomo_api: optional::<translation::FlomoApi, _>()?,

            inline_timeout: timing::InlineTimeout::get()?,
            popup_timeout: timing::PopupTimeout::get()?,
        })
    }
}

/// 未设置时返回 `None`，设置了但无效时返回错误
fn optional<V: EnvVar<T>, T>() -> EnvResult<Option<T>> {
    if V::is_set() {
        V::get().map(Some)
    } else {
        Ok(None)
    }
}

/// 打印所有支持的环境变量
pub fn print_env_help() {
    println!("Supported environment variables:");
    let vars: &[(&str, &str)] = &[
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (translation::ActiveProvider::NAME, translation::ActiveProvider::DESCRIPTION),
        (translation::DeepseekApiKey::NAME, translation::DeepseekApiKey::DESCRIPTION),
        (translation::KimiApiKey::NAME, translation::KimiApiKey::DESCRIPTION),
        (translation::OpenaiApiKey::NAME, translation::OpenaiApiKey::DESCRIPTION),
        (translation::Enabled::NAME, translation::Enabled::DESCRIPTION),
        (translation::FlomoApi::NAME, translation::FlomoApi::DESCRIPTION),
        (timing::InlineTimeout::NAME, timing::InlineTimeout::DESCRIPTION),
        (timing::PopupTimeout::NAME, timing::PopupTimeout::DESCRIPTION),
    ];
    for (name, description) in vars {
        println!("    {:<40} {}", name, description);
    }
}
