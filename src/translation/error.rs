//! 翻译请求错误处理
//!
//! 五类失败：缺少密钥、已暂停、超时、网络、远端。原始细节只进日志，
//! 按钮上显示的是 `user_message()` 给出的短文案。

use std::time::Duration;

use thiserror::Error;

use super::providers::ProviderKind;

/// 翻译错误类型
#[derive(Error, Debug)]
pub enum TranslateError {
    /// 需要密钥的服务没有配置密钥
    #[error("{provider} 未配置 API 密钥")]
    Configuration { provider: ProviderKind },

    /// 用户在设置中关闭了翻译
    #[error("翻译功能已暂停")]
    Paused,

    #[error("{provider} 请求超时 ({}ms)", .timeout.as_millis())]
    Timeout {
        provider: ProviderKind,
        timeout: Duration,
    },

    /// 传输层失败
    #[error("{provider} 网络错误: {detail}")]
    Network {
        provider: ProviderKind,
        detail: String,
    },

    /// 非成功状态码或响应体格式不对
    #[error("{provider} 返回错误{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Remote {
        provider: ProviderKind,
        status: Option<u16>,
        detail: String,
    },
}

impl TranslateError {
    pub fn network(provider: ProviderKind, error: reqwest::Error) -> Self {
        TranslateError::Network {
            provider,
            detail: error.to_string(),
        }
    }

    pub fn malformed(provider: ProviderKind, detail: impl Into<String>) -> Self {
        TranslateError::Remote {
            provider,
            status: None,
            detail: detail.into(),
        }
    }

    /// 检查错误是否可由用户重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Configuration { .. } => false,
            TranslateError::Paused => false,
            TranslateError::Timeout { .. } => true,
            TranslateError::Network { .. } => true,
            TranslateError::Remote { .. } => true,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslateError::Configuration { .. } => ErrorSeverity::Critical,
            TranslateError::Paused => ErrorSeverity::Info,
            TranslateError::Timeout { .. } => ErrorSeverity::Warning,
            TranslateError::Network { .. } => ErrorSeverity::Warning,
            TranslateError::Remote { .. } => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslateError::Configuration { .. } | TranslateError::Paused => {
                ErrorCategory::Configuration
            }
            TranslateError::Timeout { .. } => ErrorCategory::Timeout,
            TranslateError::Network { .. } => ErrorCategory::Network,
            TranslateError::Remote { .. } => ErrorCategory::Service,
        }
    }

    /// 显示在按钮上的短文案
    pub fn user_message(&self) -> &'static str {
        match self {
            TranslateError::Configuration { .. } => "[翻译失败，请设置API密钥]",
            TranslateError::Paused => "[翻译已暂停]",
            TranslateError::Timeout { .. } => "[翻译失败: 请求超时]",
            TranslateError::Network { .. } => "[翻译失败: 网络问题]",
            TranslateError::Remote {
                provider: ProviderKind::GoogleFree,
                ..
            } => "[Google翻译失败]",
            TranslateError::Remote { .. } => "[API翻译失败，请重试]",
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Timeout,
    Service,
}

pub type TranslateResult<T> = Result<T, TranslateError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslateError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::warn!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译配置错误: {}", error),
        }
    }
}
