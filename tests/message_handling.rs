//! 内容脚本消息处理与划词翻译测试

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tweet_translator::config::constants::{POPUP_CLASS, SELECTION_BUTTON_CLASS};
use tweet_translator::config::EngineConfig;
use tweet_translator::core::{Collaborators, Engine};
use tweet_translator::messaging::{DeliveryError, Message, MessageResponse, MessageTransport};
use tweet_translator::selection::{MemoryVocabulary, PopupAction};
use tweet_translator::translation::{MemorySettingsStore, ProviderKind, Settings};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{config_for, page, selector, RecordingNotifier, TestEngine, HOME};

const ARTICLE: &str = "https://blog.example.com/posts/rust";

fn article_html() -> String {
    "<html><body><main><p>Ownership is the heart of Rust.</p></main></body></html>".to_string()
}

fn google_settings() -> Settings {
    Settings {
        active_ai_provider: Some(ProviderKind::GoogleFree),
        ..Settings::default()
    }
}

struct SelectionEnv {
    engine: Engine,
    notifier: Rc<RecordingNotifier>,
    vocabulary: Rc<MemoryVocabulary>,
}

/// 侧栏还没加载好：前 `failures` 次投递失败
struct WarmingSidebar {
    failures: u32,
    sent: RefCell<Vec<&'static str>>,
    attempts: Cell<u32>,
}

impl WarmingSidebar {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            sent: RefCell::new(Vec::new()),
            attempts: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl MessageTransport for WarmingSidebar {
    async fn send(&self, message: &Message) -> Result<MessageResponse, DeliveryError> {
        self.sent.borrow_mut().push(message.action());
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        if attempt <= self.failures {
            return Err(DeliveryError("Receiving end does not exist".to_string()));
        }
        Ok(MessageResponse::ok())
    }
}

fn selection_env(server_uri: &str, settings: Settings) -> SelectionEnv {
    build_selection_env(server_uri, settings, None)
}

fn build_selection_env(
    server_uri: &str,
    settings: Settings,
    messenger: Option<Rc<dyn MessageTransport>>,
) -> SelectionEnv {
    let notifier = Rc::new(RecordingNotifier::default());
    let vocabulary = Rc::new(MemoryVocabulary::default());
    let mut parts =
        Collaborators::new(Rc::new(MemorySettingsStore::new(settings)), notifier.clone())
            .with_vocabulary(vocabulary.clone());
    if let Some(messenger) = messenger {
        parts = parts.with_messenger(messenger);
    }
    let engine = Engine::new(page(&article_html(), ARTICLE), config_for(server_uri), parts)
        .expect("engine");
    SelectionEnv {
        engine,
        notifier,
        vocabulary,
    }
}

#[tokio::test]
async fn test_show_toast_reaches_notifier() {
    let env = TestEngine::new(
        page("<html><body></body></html>", HOME),
        EngineConfig::default(),
        Settings::default(),
    );

    let response = env
        .engine
        .handle_message(Message::ShowToast {
            message: "已复制".to_string(),
        })
        .await;

    assert!(response.success);
    assert_eq!(env.notifier.last().as_deref(), Some("已复制"));
}

#[tokio::test]
async fn test_sidebar_toggle_and_check() {
    let env = TestEngine::new(
        page("<html><body></body></html>", HOME),
        EngineConfig::default(),
        Settings::default(),
    );

    let checked = env.engine.handle_message(Message::CheckSidebar).await;
    assert_eq!(checked.exists, Some(false));

    // toggleSidebar 只回 success
    let toggled = env.engine.handle_message(Message::ToggleSidebar).await;
    assert_eq!(toggled, MessageResponse::ok());
    assert_eq!(
        serde_json::to_string(&toggled).unwrap(),
        r#"{"success":true}"#
    );

    let checked = env.engine.handle_message(Message::CheckSidebar).await;
    assert_eq!(checked.exists, Some(true));
}

#[tokio::test]
async fn test_background_only_messages_are_refused() {
    let env = TestEngine::new(
        page("<html><body></body></html>", HOME),
        EngineConfig::default(),
        Settings::default(),
    );

    let response = env
        .engine
        .handle_message(Message::SaveToFlomo {
            flomo_api: "https://flomoapp.com/iwh/abc".to_string(),
            content: "hi".to_string(),
        })
        .await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("内容脚本不处理 saveToFlomo 消息"));
}

#[tokio::test]
async fn test_selected_text_translates_into_popup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .and(query_param("q", "Ownership is the heart of Rust."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[[
            "所有权是 Rust 的核心。",
            "Ownership is the heart of Rust.",
            null
        ]]])))
        .expect(1)
        .mount(&server)
        .await;

    let env = selection_env(&server.uri(), google_settings());
    assert!(env.engine.selection().is_active());
    assert!(!env.engine.diagnostics().feed_page);

    let response = env
        .engine
        .handle_message(Message::TranslateSelectedText {
            text: "Ownership is the heart of Rust.".to_string(),
        })
        .await;
    assert!(response.success);

    let page = env.engine.page();
    let popups = page.select_all(&selector(&format!(".{}", POPUP_CLASS)));
    assert_eq!(popups.len(), 1);
    let translation = page
        .select_first(&selector(".popup-translation"))
        .unwrap();
    assert_eq!(common::text_of(&translation), "所有权是 Rust 的核心。");
}

#[tokio::test]
async fn test_highlight_adds_word_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([[["所有权", "ownership", null]]])),
        )
        .mount(&server)
        .await;

    let env = selection_env(&server.uri(), google_settings());
    let selection = env.engine.selection();

    let button = selection.show_button("ownership").unwrap();
    let popup = selection.click_button(&button).await.unwrap();
    // 弹窗出现后浮动按钮已移除
    assert!(env
        .engine
        .page()
        .select_first(&selector(&format!(".{}", SELECTION_BUTTON_CLASS)))
        .is_none());

    let highlight = env
        .engine
        .page()
        .select_first(&selector(r#"button[data-action="highlight"]"#))
        .unwrap();
    assert_eq!(
        selection.popup_action(&highlight).await.unwrap(),
        PopupAction::Highlight
    );
    assert!(!env.engine.page().is_attached(&popup));

    let snapshot = env.vocabulary.snapshot();
    assert_eq!(snapshot.highlighted_words, vec!["ownership".to_string()]);
    assert_eq!(snapshot.word_data["ownership"].translation, "所有权");
    assert_eq!(env.notifier.last().as_deref(), Some("已添加到高亮单词列表"));

    assert!(!selection.highlight("ownership", "所有权").await);
    assert_eq!(env.notifier.last().as_deref(), Some("该内容已在高亮列表中"));
}

#[tokio::test(start_paused = true)]
async fn test_highlight_retries_sidebar_update() {
    let sidebar = Rc::new(WarmingSidebar::new(2));
    let messenger: Rc<dyn MessageTransport> = sidebar.clone();
    let env = build_selection_env("http://127.0.0.1:9", google_settings(), Some(messenger));

    assert!(env.engine.selection().highlight("borrow", "借用").await);

    assert_eq!(sidebar.sent.borrow().as_slice(), ["updateSidebar"; 3]);
    assert_eq!(
        env.notifier.messages(),
        vec!["已添加到高亮单词列表".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_highlight_warns_once_sidebar_stays_unreachable() {
    let sidebar = Rc::new(WarmingSidebar::new(u32::MAX));
    let messenger: Rc<dyn MessageTransport> = sidebar.clone();
    let env = build_selection_env("http://127.0.0.1:9", google_settings(), Some(messenger));

    assert!(env.engine.selection().highlight("borrow", "借用").await);

    assert_eq!(sidebar.attempts.get(), 3);
    assert_eq!(
        env.notifier.messages(),
        vec![
            "侧栏操作失败：Receiving end does not exist".to_string(),
            "已添加到高亮单词列表".to_string(),
        ]
    );
    assert_eq!(
        env.vocabulary.snapshot().highlighted_words,
        vec!["borrow".to_string()]
    );
}

#[tokio::test]
async fn test_selection_without_key_prompts_for_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let env = selection_env(&server.uri(), Settings::default());
    let response = env
        .engine
        .handle_message(Message::TranslateSelectedText {
            text: "Ownership is the heart of Rust.".to_string(),
        })
        .await;

    assert!(!response.success);
    assert_eq!(
        env.notifier.last().as_deref(),
        Some("请先在插件设置中配置 API 密钥")
    );
}
