//! tweet-translator 命令行入口
//!
//! 解析保存下来的信息流页面，挂上翻译按钮，可选地逐个翻译，然后输出标注后的 HTML。

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use tweet_translator::affordance::ClickOutcome;
use tweet_translator::config::constants::BUTTON_CLASS;
use tweet_translator::config::{config_file_exists, ConfigManager};
use tweet_translator::core::{Collaborators, Engine};
use tweet_translator::env::{self, EnvConfig, EnvVar};
use tweet_translator::messaging::{LocalBackground, NoteRelay};
use tweet_translator::notify::LogNotifier;
use tweet_translator::page::Page;
use tweet_translator::parsers::html::Selector;
use tweet_translator::translation::{MemorySettingsStore, ProviderKind, Settings};

#[derive(Parser)]
#[command(name = "tweet-translator")]
#[command(about = "Attach inline translate buttons to a saved feed page")]
#[command(version)]
struct Cli {
    /// Saved HTML page
    #[arg(required_unless_present_any = ["generate_config", "env_help"])]
    input: Option<PathBuf>,

    /// Location the page was saved from
    #[arg(short, long, default_value = "https://x.com/home")]
    url: Url,

    /// Click every button and translate sequentially
    #[arg(short, long)]
    translate: bool,

    /// Provider: deepseek, kimi, openai, google-free
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// API key for the selected provider
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Input charset, detected from the page's meta tag when omitted
    #[arg(short = 'E', long)]
    encoding: Option<String>,

    /// Per-item request timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// List supported environment variables and exit
    #[arg(long)]
    env_help: bool,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(env::core::LogLevel::get_or_default("info".to_string()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn settings_for(cli: &Cli, env_config: &EnvConfig) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env(env_config)?;
    if let Some(provider) = cli.provider {
        settings.active_ai_provider = Some(provider);
    }
    if let Some(key) = &cli.api_key {
        let kind = settings.provider();
        match kind {
            ProviderKind::Deepseek => settings.deepseek_api_key = Some(key.clone()),
            ProviderKind::Kimi => settings.kimi_api_key = Some(key.clone()),
            ProviderKind::Openai => settings.openai_api_key = Some(key.clone()),
            ProviderKind::GoogleFree => warn!("google-free 不需要 API 密钥，已忽略 --api-key"),
        }
    }
    Ok(settings)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    if cli.env_help {
        env::print_env_help();
        return Ok(());
    }
    if let Some(path) = &cli.generate_config {
        ConfigManager::generate_example_config(path)?;
        println!("已生成示例配置: {}", path.display());
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => {
            if !config_file_exists() {
                info!("未找到配置文件，使用默认配置");
            }
            ConfigManager::new()?
        }
    };
    let mut config = manager.into_config();
    if let Some(timeout) = cli.timeout {
        config.affordance.inline_timeout_ms = timeout;
    }

    let env_config = EnvConfig::from_env()?;
    let settings = settings_for(&cli, &env_config)?;

    let Some(input) = &cli.input else {
        return Ok(());
    };
    let data = fs::read(input)?;
    let page = Rc::new(Page::load(&data, cli.encoding.as_deref(), cli.url.clone()));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    let engine = Engine::new(
        page.clone(),
        config,
        Collaborators::new(Rc::new(MemorySettingsStore::new(settings)), Rc::new(LogNotifier))
            .with_messenger(Rc::new(LocalBackground::new(NoteRelay::default()))),
    )?;

    local.block_on(&runtime, async {
        let report = engine.scan(true);
        info!(
            "扫描完成: {} 个候选，{} 个按钮",
            report.candidates_seen, report.affordances_added
        );

        if cli.translate {
            let buttons = Selector::parse(&format!(".{}", BUTTON_CLASS))?;
            for button in page.select_all(&buttons) {
                match engine.click(&button).await {
                    ClickOutcome::Translated(record) => {
                        info!("{} => {}", record.item_id, record.translated_text)
                    }
                    ClickOutcome::Failed(message) => warn!("翻译失败: {}", message),
                    other => info!("跳过: {:?}", other),
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    let diagnostics = engine.diagnostics();
    eprintln!("{}", serde_json::to_string_pretty(&diagnostics)?);

    let html = page.serialize()?;
    match &cli.output {
        Some(path) => fs::write(path, html)?,
        None => std::io::stdout().write_all(&html)?,
    }
    Ok(())
}
