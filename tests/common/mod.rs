// 集成测试公共模块
//
// 时间线页面构造、记录提示的通知器以及引擎装配

use std::cell::RefCell;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use url::Url;

use tweet_translator::config::constants::{BUTTON_CLASS, RESULT_CLASS};
use tweet_translator::config::EngineConfig;
use tweet_translator::core::{Collaborators, Engine};
use tweet_translator::messaging::MessageTransport;
use tweet_translator::notify::Notifier;
use tweet_translator::page::Page;
use tweet_translator::parsers::html::{append_child, set_text, text_content, Selector};
use tweet_translator::translation::{MemorySettingsStore, ProviderKind, Settings};

pub const HOME: &str = "https://x.com/home";

/// 时间线页面构造器
pub struct TimelineBuilder {
    items: Vec<String>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// 带永久链接的推文
    pub fn tweet(mut self, status: u64, text: &str) -> Self {
        self.items.push(format!(
            r#"<div data-testid="cellInnerDiv"><article data-testid="tweet" role="article"><a href="/jack/status/{}">2h</a><div data-testid="tweetText" lang="en">{}</div></article></div>"#,
            status, text
        ));
        self
    }

    /// 没有任何 id 线索的推文
    pub fn anonymous_tweet(mut self, text: &str) -> Self {
        self.items.push(format!(
            r#"<div data-testid="cellInnerDiv"><article data-testid="tweet"><div data-testid="tweetText">{}</div></article></div>"#,
            text
        ));
        self
    }

    pub fn build(self) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><title>Home / X</title></head><body><div data-testid="primaryColumn"><section role="region"><div aria-label="Timeline">{}</div></section></div></body></html>"#,
            self.items.join("")
        )
    }
}

pub fn page(html: &str, url: &str) -> Rc<Page> {
    Rc::new(Page::from_html(
        html.as_bytes(),
        "utf-8",
        Url::parse(url).unwrap(),
    ))
}

/// 记录所有提示文案
#[derive(Default)]
pub struct RecordingNotifier {
    messages: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

pub fn settings_with_key(kind: ProviderKind, key: &str) -> Settings {
    let mut settings = Settings {
        active_ai_provider: Some(kind),
        ..Settings::default()
    };
    match kind {
        ProviderKind::Deepseek => settings.deepseek_api_key = Some(key.to_string()),
        ProviderKind::Kimi => settings.kimi_api_key = Some(key.to_string()),
        ProviderKind::Openai => settings.openai_api_key = Some(key.to_string()),
        ProviderKind::GoogleFree => {}
    }
    settings
}

/// 所有服务端点都指向测试服务器
pub fn config_for(server_uri: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    let chat = format!("{}/v1/chat/completions", server_uri);
    config.providers.deepseek.url = chat.clone();
    config.providers.kimi.url = chat.clone();
    config.providers.openai.url = chat;
    config.providers.google_free_url = format!("{}/translate_a/single", server_uri);
    config
}

/// 引擎测试环境
pub struct TestEngine {
    pub page: Rc<Page>,
    pub engine: Rc<Engine>,
    pub notifier: Rc<RecordingNotifier>,
    pub settings: Rc<MemorySettingsStore>,
}

impl TestEngine {
    pub fn new(page: Rc<Page>, config: EngineConfig, settings: Settings) -> Self {
        Self::build(page, config, settings, None)
    }

    pub fn with_messenger(
        page: Rc<Page>,
        config: EngineConfig,
        settings: Settings,
        messenger: Rc<dyn MessageTransport>,
    ) -> Self {
        Self::build(page, config, settings, Some(messenger))
    }

    fn build(
        page: Rc<Page>,
        config: EngineConfig,
        settings: Settings,
        messenger: Option<Rc<dyn MessageTransport>>,
    ) -> Self {
        let notifier = Rc::new(RecordingNotifier::default());
        let settings = Rc::new(MemorySettingsStore::new(settings));
        let mut parts = Collaborators::new(settings.clone(), notifier.clone());
        if let Some(messenger) = messenger {
            parts = parts.with_messenger(messenger);
        }
        let engine = Rc::new(Engine::new(page.clone(), config, parts).expect("engine"));
        Self {
            page,
            engine,
            notifier,
            settings,
        }
    }

    pub fn buttons(&self) -> Vec<Handle> {
        self.page.select_all(&selector(&format!(".{}", BUTTON_CLASS)))
    }

    pub fn results(&self) -> Vec<Handle> {
        self.page.select_all(&selector(&format!(".{}", RESULT_CLASS)))
    }

    pub fn tweet_texts(&self) -> Vec<Handle> {
        self.page
            .select_all(&selector(r#"div[data-testid="tweetText"]"#))
    }
}

pub fn selector(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

pub fn text_of(node: &Handle) -> String {
    text_content(node, |_| false)
}

/// 在 `parent` 下按虚拟列表的方式重新渲染一条推文
pub fn render_tweet(page: &Page, parent: &Handle, status: u64, text: &str) -> Handle {
    let cell = page.create_element("div", &[("data-testid", "cellInnerDiv")]);
    let article = page.create_element("article", &[("data-testid", "tweet")]);
    let href = format!("/jack/status/{}", status);
    let link = page.create_element("a", &[("href", href.as_str())]);
    set_text(&link, "2h");
    let body = page.create_element("div", &[("data-testid", "tweetText")]);
    set_text(&body, text);

    append_child(&article, &link);
    append_child(&article, &body);
    append_child(&cell, &article);
    append_child(parent, &cell);
    body
}
