//! # 翻译模块
//!
//! - `error`: 失败分类与用户可见文案
//! - `providers`: 各翻译服务的请求构造与响应解析
//! - `pipeline`: 带超时的单次请求
//! - `settings`: 用户设置快照

pub mod error;
pub mod pipeline;
pub mod providers;
pub mod settings;

pub use error::{ErrorCategory, ErrorSeverity, TranslateError, TranslateResult};
pub use pipeline::Translator;
pub use providers::{
    provider_for, ChatCompletionProvider, GoogleFreeProvider, ProviderKind, TranslationProvider,
    UnknownProvider,
};
pub use settings::{MemorySettingsStore, ProviderConfig, Settings, SettingsStore};
