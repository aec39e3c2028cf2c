//! 按钮管理器
//!
//! 一个条目最多只有一个按钮或一个结果块。点击时按钮先进入加载状态（禁用即防重入），
//! 请求返回后重新检查存活再渲染；失败时显示短文案并在固定延迟后恢复。

use std::rc::Rc;

use chrono::Utc;
use markup5ever_rcdom::Handle;
use tracing::{debug, info, warn};

use super::liveness::{self, Liveness, StaleReason};
use super::state::ButtonState;
use super::{container_of, item_text};
use crate::config::constants::{
    BUTTON_CLASS, EMPTY_TEXT_LABEL, IDLE_LABEL, ITEM_ID_ATTR, PROCESSED_ATTR, RESULT_CLASS,
    SAVE_NOTE_CLASS, SAVE_NOTE_LABEL,
};
use crate::config::{AffordanceConfig, MessagingConfig};
use crate::messaging::{note_content, save_note, MessageResponse, MessageTransport, NoteError};
use crate::notify::Notifier;
use crate::page::Page;
use crate::parsers::html::{
    ancestors, append_child, detach, get_node_attr, get_parent_node, has_class, set_node_attr,
    set_text, Detach, Selector,
};
use crate::registry::{ItemId, ItemPatch, ItemStatus, SharedRegistry, TranslationRecord};
use crate::translation::{Settings, SettingsStore, Translator};

/// 一次点击的结果
#[derive(Debug)]
pub enum ClickOutcome {
    /// 按钮正在加载或不是翻译按钮
    Ignored,
    Translated(TranslationRecord),
    /// 使用了本会话已有的翻译结果，没有发出请求
    Reused(TranslationRecord),
    /// 返回时条目已经失效，结果被丢弃
    Discarded(StaleReason),
    /// 按钮显示的错误文案
    Failed(&'static str),
}

pub struct AffordanceManager {
    page: Rc<Page>,
    registry: SharedRegistry,
    translator: Rc<Translator>,
    settings: Rc<dyn SettingsStore>,
    notifier: Rc<dyn Notifier>,
    messenger: Option<Rc<dyn MessageTransport>>,
    messaging: MessagingConfig,
    config: AffordanceConfig,
    container: Selector,
}

impl AffordanceManager {
    pub fn new(
        page: Rc<Page>,
        registry: SharedRegistry,
        translator: Rc<Translator>,
        settings: Rc<dyn SettingsStore>,
        notifier: Rc<dyn Notifier>,
        config: AffordanceConfig,
        container: Selector,
    ) -> Self {
        Self {
            page,
            registry,
            translator,
            settings,
            notifier,
            messenger: None,
            messaging: MessagingConfig::default(),
            config,
            container,
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

    pub fn page(&self) -> &Rc<Page> {
        &self.page
    }

    pub fn container_selector(&self) -> &Selector {
        &self.container
    }

    /// 在条目节点末尾挂上翻译按钮
    pub fn create_button(&self, id: &ItemId, node: &Handle) -> Handle {
        let button = self
            .page
            .create_element("button", &[("class", BUTTON_CLASS), (ITEM_ID_ATTR, id.as_str())]);
        set_text(&button, IDLE_LABEL);
        append_child(node, &button);

        self.registry.borrow_mut().upsert(
            id,
            ItemPatch::new()
                .node(node)
                .status(ItemStatus::AffordanceShown),
        );
        debug!("已添加翻译按钮: {}", id);
        button
    }

    /// 条目重新出现时，本会话已有同文本的翻译就直接显示
    pub fn restore_result(&self, id: &ItemId, node: &Handle, button: &Handle) -> bool {
        let text = item_text(node);
        let cached = self
            .registry
            .borrow()
            .result_for(id)
            .filter(|record| record.original_text == text)
            .cloned();
        let Some(record) = cached else {
            return false;
        };

        let settings = self.settings.snapshot();
        self.replace_with_result(node, button, record, &settings).is_ok()
    }

    /// 处理一次按钮点击
    ///
    /// 错误状态的自动恢复通过 `spawn_local` 调度，必须在 `LocalSet` 中调用。
    pub async fn click(&self, button: &Handle) -> ClickOutcome {
        if !has_class(button, BUTTON_CLASS) || ButtonState::read(button).is_loading() {
            debug!("忽略点击：按钮不可用");
            return ClickOutcome::Ignored;
        }

        let Some(node) = get_parent_node(button) else {
            return ClickOutcome::Discarded(StaleReason::ButtonDetached);
        };
        let Some(id) = get_node_attr(button, ITEM_ID_ATTR)
            .or_else(|| get_node_attr(&node, ITEM_ID_ATTR))
            .map(ItemId::new)
        else {
            warn!("翻译按钮缺少条目 id");
            return ClickOutcome::Ignored;
        };

        // 行已被移除或已有结果块时不发请求
        if let Liveness::Stale(reason) = liveness::check(&self.page, &node, Some(button)) {
            return self.discard(&id, &node, button, reason);
        }

        ButtonState::Loading.apply(button);
        self.registry.borrow_mut().upsert(
            &id,
            ItemPatch::new()
                .node(&node)
                .status(ItemStatus::Translating),
        );

        let settings = self.settings.snapshot();
        let text = item_text(&node);
        if text.is_empty() {
            return self.fail(button, &id, EMPTY_TEXT_LABEL);
        }

        let cached = self
            .registry
            .borrow()
            .result_for(&id)
            .filter(|record| record.original_text == text)
            .cloned();
        if let Some(record) = cached {
            debug!("复用已有翻译: {}", id);
            return match self.replace_with_result(&node, button, record.clone(), &settings) {
                Ok(_) => ClickOutcome::Reused(record),
                Err(reason) => self.discard(&id, &node, button, reason),
            };
        }

        let provider = settings.provider_config();
        let result = self
            .translator
            .translate(&text, &provider, self.config.inline_timeout())
            .await;

        match result {
            Ok(translated) => {
                let record = TranslationRecord {
                    item_id: id.clone(),
                    original_text: text,
                    translated_text: translated,
                    provider: provider.kind,
                    timestamp: Utc::now(),
                };
                match self.replace_with_result(&node, button, record.clone(), &settings) {
                    Ok(_) => ClickOutcome::Translated(record),
                    Err(reason) => self.discard(&id, &node, button, reason),
                }
            }
            Err(error) => self.fail(button, &id, error.user_message()),
        }
    }

    /// 用结果块替换按钮，替换前重新检查条目存活
    pub fn replace_with_result(
        &self,
        node: &Handle,
        button: &Handle,
        record: TranslationRecord,
        settings: &Settings,
    ) -> Result<Handle, StaleReason> {
        if let Liveness::Stale(reason) = liveness::check(&self.page, node, Some(button)) {
            return Err(reason);
        }

        let block = self.build_result_block(&record, settings.note_endpoint().is_some());

        if detach(button, self.page.document()) == Detach::FromDocumentSearch {
            debug!("按钮父指针失效，已通过全文档查找移除");
        }

        let parent = get_parent_node(node).unwrap_or_else(|| node.clone());
        append_child(&parent, &block);
        set_node_attr(&container_of(&self.container, node), PROCESSED_ATTR, Some("true"));

        info!(
            "已渲染翻译结果: {} ({})",
            record.item_id, record.provider
        );
        let id = record.item_id.clone();
        self.registry.borrow_mut().upsert(
            &id,
            ItemPatch::new()
                .node(node)
                .status(ItemStatus::Translated)
                .result(record),
        );
        Ok(block)
    }

    fn build_result_block(&self, record: &TranslationRecord, with_note_button: bool) -> Handle {
        let block = self.page.create_element(
            "div",
            &[("class", RESULT_CLASS), (ITEM_ID_ATTR, record.item_id.as_str())],
        );

        let line = self.page.create_element("div", &[]);
        set_text(
            &line,
            &format!("{}翻译：{}", record.provider.label(), record.translated_text),
        );
        append_child(&block, &line);

        if with_note_button {
            let save = self.page.create_element("button", &[("class", SAVE_NOTE_CLASS)]);
            set_text(&save, SAVE_NOTE_LABEL);
            append_child(&block, &save);
        }
        block
    }

    fn discard(&self, id: &ItemId, node: &Handle, button: &Handle, reason: StaleReason) -> ClickOutcome {
        debug!("条目 {} 已失效 ({:?})，丢弃翻译结果", id, reason);
        let mut registry = self.registry.borrow_mut();
        // 重新渲染的行可能已经用同一 id 登记了新节点
        let owns_entry = registry
            .get(id)
            .and_then(|item| item.node())
            .is_some_and(|current| Rc::ptr_eq(&current, node));

        match reason {
            StaleReason::NodeDetached => {
                if owns_entry {
                    registry.remove(id);
                }
            }
            StaleReason::ButtonDetached => {
                if owns_entry {
                    registry.remove(id);
                    set_node_attr(&container_of(&self.container, node), PROCESSED_ATTR, None);
                }
            }
            StaleReason::CompetingResult => {
                detach(button, self.page.document());
                registry.upsert(id, ItemPatch::new().status(ItemStatus::Translated));
            }
        }
        ClickOutcome::Discarded(reason)
    }

    fn fail(&self, button: &Handle, id: &ItemId, message: &'static str) -> ClickOutcome {
        self.registry
            .borrow_mut()
            .upsert(id, ItemPatch::new().status(ItemStatus::Failed));

        if self.page.is_attached(button) {
            let state = ButtonState::error_now(message);
            state.apply(button);
            self.schedule_revert(button.clone(), state);
        } else {
            debug!("按钮已不在页面中，跳过错误状态");
        }
        ClickOutcome::Failed(message)
    }

    fn schedule_revert(&self, button: Handle, expected: ButtonState) {
        let delay = self.config.error_revert();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if ButtonState::read(&button) == expected {
                ButtonState::Idle.apply(&button);
            }
        });
    }

    /// 处理结果块中的“保存到 Flomo”按钮
    pub async fn save_to_note(&self, save_button: &Handle) -> Result<MessageResponse, NoteError> {
        let block = ancestors(save_button)
            .into_iter()
            .find(|node| has_class(node, RESULT_CLASS))
            .ok_or(NoteError::NotAResultBlock)?;
        let id = get_node_attr(&block, ITEM_ID_ATTR)
            .map(ItemId::new)
            .ok_or(NoteError::NotAResultBlock)?;

        let record = self
            .registry
            .borrow()
            .result_for(&id)
            .cloned()
            .ok_or_else(|| NoteError::MissingRecord(id.to_string()))?;

        let settings = self.settings.snapshot();
        save_note(
            self.messenger.as_deref(),
            &self.messaging,
            self.notifier.as_ref(),
            settings.note_endpoint(),
            note_content(
                &record.original_text,
                &record.translated_text,
                &self.page.location(),
            ),
        )
        .await
    }
}
