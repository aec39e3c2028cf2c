//! 引擎配置管理模块
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

pub mod manager;

pub use manager::{
    AffordanceConfig, ConfigError, ConfigManager, ConfigResult, DiscoveryConfig, EndpointConfig,
    EngineConfig, MaintenanceConfig, MessagingConfig, ProvidersConfig, TriggerConfig,
};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 页面标记
    pub const BUTTON_CLASS: &str = "translate-button";
    pub const BUTTON_LOADING_CLASS: &str = "translate-button-loading";
    pub const BUTTON_ERROR_CLASS: &str = "translate-button-error";
    pub const RESULT_CLASS: &str = "translated-text";
    pub const SAVE_NOTE_CLASS: &str = "save-to-flomo-button";
    pub const ITEM_ID_ATTR: &str = "data-tweet-id";
    pub const ERROR_TIME_ATTR: &str = "data-error-time";
    pub const PROCESSED_ATTR: &str = "data-translated";
    pub const TOAST_CLASS: &str = "tweet-translator-toast";
    pub const POPUP_CLASS: &str = "translation-result-popup";
    pub const SELECTION_BUTTON_CLASS: &str = "floating-translate-button";

    // 按钮文案
    pub const IDLE_LABEL: &str = "翻译";
    pub const LOADING_LABEL: &str = "翻译中…";
    pub const EMPTY_TEXT_LABEL: &str = "[无文本可翻译]";
    pub const SAVE_NOTE_LABEL: &str = "保存到 Flomo";
    pub const SELECTION_LABEL: &str = "翻译所选内容";
    pub const HIGHLIGHT_LABEL: &str = "高亮保存";

    // 文本过滤
    pub const MIN_TEXT_LENGTH: usize = 5;

    // 超时
    pub const DEFAULT_INLINE_TIMEOUT: Duration = Duration::from_millis(10_000);
    pub const DEFAULT_POPUP_TIMEOUT: Duration = Duration::from_millis(15_000);
    pub const DEFAULT_ERROR_REVERT: Duration = Duration::from_millis(3_000);
    pub const DEFAULT_STALE_ERROR_AGE: Duration = Duration::from_millis(30_000);

    // 维护
    pub const DUPLICATE_THRESHOLD: usize = 3;

    // 触发节奏
    pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(300);
    pub const BODY_MUTATION_THROTTLE: Duration = Duration::from_millis(1_000);
    pub const CONTAINER_MUTATION_THROTTLE: Duration = Duration::from_millis(800);
    pub const LOCATION_POLL_INTERVAL: Duration = Duration::from_millis(300);
    pub const NAVIGATION_FIRST_DELAY: Duration = Duration::from_millis(800);
    pub const NAVIGATION_STEP: Duration = Duration::from_millis(500);
    pub const NAVIGATION_MAX_ATTEMPTS: u32 = 10;
    pub const DETAIL_STARTUP_DELAYS_MS: &[u64] = &[800, 1_500, 3_000, 6_000];
    pub const PERIODIC_SCAN_INTERVAL: Duration = Duration::from_millis(15_000);
    pub const SWEEP_INTERVAL: Duration = Duration::from_millis(10_000);
    pub const REGION_REFRESH_INTERVAL: Duration = Duration::from_millis(2_000);
    pub const CONTAINER_REFRESH_INTERVAL: Duration = Duration::from_millis(5_000);

    // 消息重试
    pub const MESSAGE_RETRY_ATTEMPTS: u32 = 3;
    pub const MESSAGE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    // 翻译服务
    pub const DEFAULT_PROVIDER: &str = "deepseek";
    pub const DEEPSEEK_URL: &str = "https://api.deepseek.com/v1/chat/completions";
    pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
    pub const KIMI_URL: &str = "https://api.moonshot.cn/v1/chat/completions";
    pub const KIMI_MODEL: &str = "moonshot-v1-8k";
    pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
    pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
    pub const GOOGLE_FREE_URL: &str = "https://translate.googleapis.com/translate_a/single";
    pub const MAX_TOKENS: u32 = 150;
    pub const TRANSLATION_INSTRUCTION: &str = "You are a concise translator. Translate the following text into Chinese if it's English, or to English if it's Chinese, keeping it brief and accurate.";

    // 结构选择器（按优先级）
    pub const PRIMARY_SELECTORS: &[&str] = &[
        r#"article[data-testid="tweet"] div[data-testid="tweetText"]"#,
        r#"div[data-testid="tweetText"]"#,
        r#"div[data-testid="tweet"] div[data-testid="tweetText"]"#,
        r#"div[data-testid="cellInnerDiv"] article div[data-testid="tweetText"]"#,
    ];

    // 详情页主推文
    pub const DETAIL_SELECTORS: &[&str] = &[
        r#"div[data-testid="tweet"] div[data-testid="tweetText"]"#,
        r#"article[data-testid="tweet"] div[data-testid="tweetText"]"#,
        r#"div[aria-labelledby][role="article"] div[data-testid="tweetText"]"#,
    ];

    pub const CONTAINER_SELECTOR: &str = "article";

    // 观察根：视口交叉看区域，子树变更看主栏与区域
    pub const PRIMARY_COLUMN_SELECTOR: &str = r#"div[data-testid="primaryColumn"]"#;
    pub const REGION_SELECTOR: &str = r#"section[role="region"]"#;
    pub const TIMELINE_SELECTOR: &str = r#"div[aria-label="Timeline"]"#;

    pub const FEED_HOSTS: &[&str] = &["twitter.com", "x.com"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "tweet-translator.toml",
        "config.toml",
        ".tweet-translator.toml",
        "~/.config/tweet-translator/config.toml",
        "/etc/tweet-translator/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
