//! 划词翻译
//!
//! 只在非信息流页面启用：选中文本后出现浮动按钮，点击后翻译并弹出结果，
//! 结果弹窗可以把内容加入高亮单词表或保存到 Flomo。

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::constants::{
    HIGHLIGHT_LABEL, LOADING_LABEL, POPUP_CLASS, SELECTION_BUTTON_CLASS, SELECTION_LABEL,
};
use crate::config::{AffordanceConfig, DiscoveryConfig, MessagingConfig};
use crate::messaging::{
    note_content, save_note, send_with_retry, Message, MessageResponse, MessageTransport,
    NoteError,
};
use crate::notify::Notifier;
use crate::page::Page;
use crate::parsers::html::{
    ancestors, append_child, detach, get_node_attr, has_class, set_text, Selector,
};
use crate::translation::{ProviderKind, SettingsStore, TranslateError, Translator};

const SELECTED_TEXT_ATTR: &str = "data-selected-text";
const ORIGINAL_ATTR: &str = "data-original";
const TRANSLATION_ATTR: &str = "data-translation";
const ACTION_ATTR: &str = "data-action";
const ACTION_BUTTON_CLASS: &str = "translation-action-button";

/// 高亮单词表中的一项，字段名与扩展存储一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub word: String,
    pub translation: String,
    pub phonetics: String,
    pub tweet_original: String,
    pub tweet_translated: String,
    pub examples: Vec<String>,
}

impl VocabularyEntry {
    pub fn new(word: &str, translation: &str) -> Self {
        Self {
            word: word.to_string(),
            translation: translation.to_string(),
            phonetics: String::new(),
            tweet_original: String::new(),
            tweet_translated: String::new(),
            examples: Vec::new(),
        }
    }
}

pub trait VocabularyStore {
    fn contains(&self, word: &str) -> bool;

    fn insert(&self, entry: VocabularyEntry);
}

/// `highlightedWords` + `wordData` 的存储形态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularySnapshot {
    #[serde(default)]
    pub highlighted_words: Vec<String>,
    #[serde(default)]
    pub word_data: BTreeMap<String, VocabularyEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    state: RefCell<VocabularySnapshot>,
}

impl MemoryVocabulary {
    pub fn snapshot(&self) -> VocabularySnapshot {
        self.state.borrow().clone()
    }
}

impl VocabularyStore for MemoryVocabulary {
    fn contains(&self, word: &str) -> bool {
        self.state
            .borrow()
            .highlighted_words
            .iter()
            .any(|w| w == word)
    }

    fn insert(&self, entry: VocabularyEntry) {
        let mut state = self.state.borrow_mut();
        if !state.highlighted_words.contains(&entry.word) {
            state.highlighted_words.push(entry.word.clone());
        }
        state.word_data.insert(entry.word.clone(), entry);
    }
}

/// 弹窗按钮对应的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAction {
    Highlight,
    SaveNote,
    Close,
}

impl PopupAction {
    fn as_str(&self) -> &'static str {
        match self {
            PopupAction::Highlight => "highlight",
            PopupAction::SaveNote => "flomo",
            PopupAction::Close => "close",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value {
            "highlight" => Some(PopupAction::Highlight),
            "flomo" => Some(PopupAction::SaveNote),
            "close" => Some(PopupAction::Close),
            _ => None,
        }
    }
}

pub struct SelectionTranslator {
    page: Rc<Page>,
    translator: Rc<Translator>,
    settings: Rc<dyn SettingsStore>,
    notifier: Rc<dyn Notifier>,
    vocabulary: Rc<dyn VocabularyStore>,
    messenger: Option<Rc<dyn MessageTransport>>,
    messaging: MessagingConfig,
    popup_timeout: Duration,
    feed_hosts: Vec<String>,
    floating: Selector,
    popup: Selector,
}

impl SelectionTranslator {
    pub fn new(
        page: Rc<Page>,
        translator: Rc<Translator>,
        settings: Rc<dyn SettingsStore>,
        notifier: Rc<dyn Notifier>,
        vocabulary: Rc<dyn VocabularyStore>,
        affordance: &AffordanceConfig,
        discovery: &DiscoveryConfig,
    ) -> Self {
        Self {
            page,
            translator,
            settings,
            notifier,
            vocabulary,
            messenger: None,
            messaging: MessagingConfig::default(),
            popup_timeout: affordance.popup_timeout(),
            feed_hosts: discovery.feed_hosts.clone(),
            floating: Selector::parse(&format!(".{}", SELECTION_BUTTON_CLASS))
                .expect("static selector"),
            popup: Selector::parse(&format!(".{}", POPUP_CLASS)).expect("static selector"),
        }
    }

    pub fn with_messenger(
        mut self,
        messenger: Rc<dyn MessageTransport>,
        messaging: MessagingConfig,
    ) -> Self {
        self.messenger = Some(messenger);
        self.messaging = messaging;
        self
    }

    /// 信息流页面使用按钮翻译，不启用划词
    pub fn is_active(&self) -> bool {
        !self.page.is_feed_host(&self.feed_hosts)
    }

    /// 选中文本后显示浮动按钮，已有的按钮和弹窗会先被移除
    pub fn show_button(&self, selected: &str) -> Option<Handle> {
        let text = selected.trim();
        if !self.is_active() || text.chars().count() <= 1 {
            return None;
        }
        let body = self.page.body()?;

        self.dismiss();
        let button = self.page.create_element(
            "div",
            &[("class", SELECTION_BUTTON_CLASS), (SELECTED_TEXT_ATTR, text)],
        );
        set_text(&button, SELECTION_LABEL);
        append_child(&body, &button);
        debug!("已显示划词翻译按钮 ({} 字符)", text.chars().count());
        Some(button)
    }

    /// 移除浮动按钮与结果弹窗
    pub fn dismiss(&self) {
        let stale: Vec<Handle> = self
            .page
            .select_all(&self.floating)
            .into_iter()
            .chain(self.page.select_all(&self.popup))
            .collect();
        for node in stale {
            detach(&node, self.page.document());
        }
    }

    pub async fn click_button(&self, button: &Handle) -> Result<Handle, TranslateError> {
        let text = get_node_attr(button, SELECTED_TEXT_ATTR).unwrap_or_default();
        set_text(button, LOADING_LABEL);
        self.translate_selection(&text).await
    }

    /// 翻译选中内容并显示结果弹窗，失败时提示并移除浮动按钮
    pub async fn translate_selection(&self, text: &str) -> Result<Handle, TranslateError> {
        let settings = self.settings.snapshot();
        let provider = settings.provider_config();

        let result = self
            .translator
            .translate(text, &provider, self.popup_timeout)
            .await;

        match result {
            Ok(translated) => {
                self.dismiss();
                let popup = self.show_popup(
                    text,
                    &translated,
                    provider.kind,
                    settings.note_endpoint().is_some(),
                );
                info!("划词翻译完成 ({})", provider.kind);
                Ok(popup)
            }
            Err(error) => {
                let message = match &error {
                    TranslateError::Configuration { .. } => {
                        "请先在插件设置中配置 API 密钥".to_string()
                    }
                    TranslateError::Paused => "翻译功能当前已暂停，请在设置中启用".to_string(),
                    _ if provider.kind == ProviderKind::GoogleFree => {
                        format!("Google翻译失败: {}", error)
                    }
                    _ => format!("翻译失败: {}", error),
                };
                self.notifier.notify(&message);
                self.dismiss();
                Err(error)
            }
        }
    }

    fn show_popup(
        &self,
        original: &str,
        translated: &str,
        provider: ProviderKind,
        with_note_button: bool,
    ) -> Handle {
        let popup = self.page.create_element(
            "div",
            &[
                ("class", POPUP_CLASS),
                (ORIGINAL_ATTR, original),
                (TRANSLATION_ATTR, translated),
            ],
        );

        let heading = format!("{} 翻译", provider.label());
        for (class, text) in [
            ("popup-label", "原文"),
            ("popup-original", original),
            ("popup-label", heading.as_str()),
            ("popup-translation", translated),
        ] {
            let line = self.page.create_element("div", &[("class", class)]);
            set_text(&line, text);
            append_child(&popup, &line);
        }

        let actions = self.page.create_element("div", &[("class", "popup-actions")]);
        let mut buttons = vec![(PopupAction::Highlight, HIGHLIGHT_LABEL)];
        if with_note_button {
            buttons.push((PopupAction::SaveNote, "保存到Flomo"));
        }
        buttons.push((PopupAction::Close, "关闭"));

        for (action, label) in buttons {
            let button = self.page.create_element(
                "button",
                &[("class", ACTION_BUTTON_CLASS), (ACTION_ATTR, action.as_str())],
            );
            set_text(&button, label);
            append_child(&actions, &button);
        }
        append_child(&popup, &actions);

        if let Some(body) = self.page.body() {
            append_child(&body, &popup);
        }
        popup
    }

    /// 处理弹窗中的按钮点击
    pub async fn popup_action(&self, button: &Handle) -> Result<PopupAction, NoteError> {
        let action = get_node_attr(button, ACTION_ATTR)
            .as_deref()
            .and_then(PopupAction::from_attr)
            .ok_or(NoteError::NotAResultBlock)?;
        let popup = ancestors(button)
            .into_iter()
            .find(|node| has_class(node, POPUP_CLASS))
            .ok_or(NoteError::NotAResultBlock)?;

        let original = get_node_attr(&popup, ORIGINAL_ATTR).unwrap_or_default();
        let translation = get_node_attr(&popup, TRANSLATION_ATTR).unwrap_or_default();

        match action {
            PopupAction::Highlight => {
                self.highlight(&original, &translation).await;
                detach(&popup, self.page.document());
            }
            PopupAction::SaveNote => {
                let settings = self.settings.snapshot();
                save_note(
                    self.messenger.as_deref(),
                    &self.messaging,
                    self.notifier.as_ref(),
                    settings.note_endpoint(),
                    note_content(&original, &translation, &self.page.location()),
                )
                .await?;
                detach(&popup, self.page.document());
            }
            PopupAction::Close => {
                detach(&popup, self.page.document());
            }
        }
        Ok(action)
    }

    /// 加入高亮单词表，已存在时返回 false
    pub async fn highlight(&self, word: &str, translation: &str) -> bool {
        if self.vocabulary.contains(word) {
            self.notifier.notify("该内容已在高亮列表中");
            return false;
        }

        self.vocabulary.insert(VocabularyEntry::new(word, translation));
        debug!("已加入高亮单词表: {}", word);

        if let Some(messenger) = &self.messenger {
            let sent = send_with_retry(
                messenger.as_ref(),
                &Message::UpdateSidebar,
                &self.messaging,
                self.notifier.as_ref(),
            )
            .await;
            if let Err(error) = sent {
                debug!("侧栏未更新: {}", error);
            }
        }
        self.notifier.notify("已添加到高亮单词列表");
        true
    }

    /// 处理后台转发的 `translateSelectedText`
    pub async fn handle_translate_request(&self, text: &str) -> MessageResponse {
        match self.translate_selection(text).await {
            Ok(_) => MessageResponse::ok(),
            Err(error) => MessageResponse::failed(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::notify::LogNotifier;
    use crate::translation::{MemorySettingsStore, Settings};
    use url::Url;

    fn translator_on(url: &str) -> (Rc<Page>, SelectionTranslator) {
        let page = Rc::new(Page::from_html(
            b"<html><body><p>Some article text</p></body></html>",
            "utf-8",
            Url::parse(url).unwrap(),
        ));
        let config = EngineConfig::default();
        let selection = SelectionTranslator::new(
            page.clone(),
            Rc::new(Translator::new(config.providers.clone())),
            Rc::new(MemorySettingsStore::new(Settings::default())),
            Rc::new(LogNotifier),
            Rc::new(MemoryVocabulary::default()),
            &config.affordance,
            &config.discovery,
        );
        (page, selection)
    }

    #[test]
    fn test_button_only_on_other_hosts() {
        let (_, on_feed) = translator_on("https://x.com/home");
        assert!(!on_feed.is_active());
        assert!(on_feed.show_button("hello there").is_none());

        let (page, elsewhere) = translator_on("https://example.org/post");
        assert!(elsewhere.show_button("a").is_none(), "single characters are ignored");
        let button = elsewhere.show_button("  hello there ").unwrap();
        assert_eq!(
            get_node_attr(&button, SELECTED_TEXT_ATTR).as_deref(),
            Some("hello there")
        );

        elsewhere.show_button("another selection");
        let floating = Selector::parse(".floating-translate-button").unwrap();
        assert_eq!(page.select_all(&floating).len(), 1);
    }

    #[tokio::test]
    async fn test_highlight_rejects_duplicates() {
        let vocabulary = Rc::new(MemoryVocabulary::default());
        let (page, _) = translator_on("https://example.org/");
        let config = EngineConfig::default();
        let selection = SelectionTranslator::new(
            page,
            Rc::new(Translator::new(config.providers.clone())),
            Rc::new(MemorySettingsStore::default()),
            Rc::new(LogNotifier),
            vocabulary.clone(),
            &config.affordance,
            &config.discovery,
        );

        assert!(selection.highlight("serendipity", "机缘巧合").await);
        assert!(!selection.highlight("serendipity", "机缘巧合").await);

        let snapshot = vocabulary.snapshot();
        assert_eq!(snapshot.highlighted_words, vec!["serendipity".to_string()]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["wordData"]["serendipity"]["tweetOriginal"], "");
        assert_eq!(json["wordData"]["serendipity"]["examples"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_missing_key_removes_button() {
        let (page, selection) = translator_on("https://example.org/");
        let button = selection.show_button("hello there").unwrap();

        let err = selection.click_button(&button).await.unwrap_err();
        assert!(matches!(err, TranslateError::Configuration { .. }));
        assert!(!page.is_attached(&button));
    }
}
