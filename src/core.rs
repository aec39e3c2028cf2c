//! 引擎装配
//!
//! `Engine` 拥有页面上的全部状态：条目登记表、扫描器、按钮管理器、清理器和划词翻译。
//! 触发协调器通过 `ScanTarget` 驱动它；宿主通过 `TriggerHandle` 发信号、
//! 通过 `click` / `handle_message` 转发用户操作。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};
use markup5ever_rcdom::Handle;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::affordance::{AffordanceManager, ClickOutcome};
use crate::config::constants::{
    BUTTON_CLASS, BUTTON_ERROR_CLASS, PRIMARY_COLUMN_SELECTOR, REGION_SELECTOR, RESULT_CLASS,
    TIMELINE_SELECTOR,
};
use crate::config::{ConfigError, EngineConfig};
use crate::discovery::{ScanReport, Scanner};
use crate::maintenance::{ResetReport, SweepReport, Sweeper};
use crate::messaging::{Message, MessageResponse, MessageTransport, NoteError};
use crate::notify::Notifier;
use crate::page::Page;
use crate::parsers::html::{contains, Selector, SelectorError};
use crate::registry::{ItemRegistry, SharedRegistry};
use crate::selection::{MemoryVocabulary, SelectionTranslator, VocabularyStore};
use crate::translation::{SettingsStore, Translator};
use crate::triggers::{Coordinator, MutationRoot, ScanTarget, TriggerHandle};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("选择器配置错误: {0}")]
    Selector(#[from] SelectorError),
}

/// 引擎依赖的外部协作者
pub struct Collaborators {
    pub settings: Rc<dyn SettingsStore>,
    pub notifier: Rc<dyn Notifier>,
    pub messenger: Option<Rc<dyn MessageTransport>>,
    pub vocabulary: Rc<dyn VocabularyStore>,
    pub client: Client,
}

impl Collaborators {
    pub fn new(settings: Rc<dyn SettingsStore>, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            settings,
            notifier,
            messenger: None,
            vocabulary: Rc::new(MemoryVocabulary::default()),
            client: Client::new(),
        }
    }

    pub fn with_messenger(mut self, messenger: Rc<dyn MessageTransport>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Rc<dyn VocabularyStore>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

/// 扫描统计
#[derive(Debug, Default)]
pub struct ScanStats {
    scans: Cell<u64>,
    buttons_added: Cell<u64>,
    last_scan: Cell<Option<DateTime<Utc>>>,
}

impl ScanStats {
    fn record(&self, report: &ScanReport) {
        self.scans.set(self.scans.get() + 1);
        self.buttons_added
            .set(self.buttons_added.get() + report.affordances_added as u64);
        self.last_scan.set(Some(Utc::now()));
    }

    pub fn scans(&self) -> u64 {
        self.scans.get()
    }

    pub fn buttons_added(&self) -> u64 {
        self.buttons_added.get()
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.last_scan.get()
    }
}

/// 页面诊断信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub url: String,
    pub feed_page: bool,
    pub detail_view: bool,
    pub scans: u64,
    pub buttons_added: u64,
    pub last_scan: Option<String>,
    pub live_buttons: usize,
    pub error_buttons: usize,
    pub result_blocks: usize,
    pub registered_items: usize,
    pub archived_results: usize,
}

struct Markers {
    buttons: Selector,
    error_buttons: Selector,
    results: Selector,
    regions: Vec<Selector>,
    containers: Vec<Selector>,
}

impl Markers {
    fn new() -> Result<Self, SelectorError> {
        Ok(Self {
            buttons: Selector::parse(&format!(".{}", BUTTON_CLASS))?,
            error_buttons: Selector::parse(&format!(".{}", BUTTON_ERROR_CLASS))?,
            results: Selector::parse(&format!(".{}", RESULT_CLASS))?,
            regions: vec![
                Selector::parse(REGION_SELECTOR)?,
                Selector::parse(TIMELINE_SELECTOR)?,
            ],
            containers: vec![
                Selector::parse(PRIMARY_COLUMN_SELECTOR)?,
                Selector::parse(REGION_SELECTOR)?,
            ],
        })
    }
}

pub struct Engine {
    page: Rc<Page>,
    config: EngineConfig,
    registry: SharedRegistry,
    notifier: Rc<dyn Notifier>,
    affordances: Rc<AffordanceManager>,
    scanner: Scanner,
    sweeper: Sweeper,
    selection: SelectionTranslator,
    stats: ScanStats,
    markers: Markers,
    observed_regions: RefCell<Vec<Handle>>,
    observed_containers: RefCell<Vec<Handle>>,
    sidebar_open: Cell<bool>,
}

impl Engine {
    pub fn new(
        page: Rc<Page>,
        config: EngineConfig,
        parts: Collaborators,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let registry = ItemRegistry::shared();
        let translator = Rc::new(Translator::with_client(
            parts.client,
            config.providers.clone(),
        ));
        let container = Selector::parse(&config.discovery.container_selector)?;

        let mut affordances = AffordanceManager::new(
            page.clone(),
            registry.clone(),
            translator.clone(),
            parts.settings.clone(),
            parts.notifier.clone(),
            config.affordance.clone(),
            container.clone(),
        );
        let mut selection = SelectionTranslator::new(
            page.clone(),
            translator,
            parts.settings,
            parts.notifier.clone(),
            parts.vocabulary,
            &config.affordance,
            &config.discovery,
        );
        if let Some(messenger) = parts.messenger {
            affordances =
                affordances.with_messenger(messenger.clone(), config.messaging.clone());
            selection = selection.with_messenger(messenger, config.messaging.clone());
        }
        let affordances = Rc::new(affordances);

        let scanner = Scanner::new(
            page.clone(),
            registry.clone(),
            affordances.clone(),
            &config.discovery,
        )?;
        let sweeper = Sweeper::new(
            page.clone(),
            registry.clone(),
            config.maintenance.clone(),
            container,
        );

        let engine = Self {
            page,
            config,
            registry,
            notifier: parts.notifier,
            affordances,
            scanner,
            sweeper,
            selection,
            stats: ScanStats::default(),
            markers: Markers::new()?,
            observed_regions: RefCell::new(Vec::new()),
            observed_containers: RefCell::new(Vec::new()),
            sidebar_open: Cell::new(false),
        };
        engine.refresh_observed_regions();
        engine.refresh_mutation_roots();
        Ok(engine)
    }

    pub fn page(&self) -> &Rc<Page> {
        &self.page
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn affordances(&self) -> &Rc<AffordanceManager> {
        &self.affordances
    }

    pub fn selection(&self) -> &SelectionTranslator {
        &self.selection
    }

    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// 扫描前先清掉重复按钮和过期错误，避免它们挡住候选
    pub fn scan(&self, full_scan: bool) -> ScanReport {
        self.sweeper.sweep_duplicates();
        self.sweeper.sweep_stale_errors();

        let report = self.scanner.scan(full_scan);
        self.stats.record(&report);
        report
    }

    pub fn sweep(&self) {
        let report = self.sweeper.sweep();
        if report != SweepReport::default() {
            debug!("周期清理: {:?}", report);
        }
    }

    /// 移除所有按钮与结果、清空登记表，然后重新全量扫描
    pub fn full_reset(&self) -> (ResetReport, ScanReport) {
        let reset = self.sweeper.full_reset();
        info!("已重置页面状态: {:?}", reset);
        (reset, self.scan(true))
    }

    pub async fn click(&self, button: &Handle) -> ClickOutcome {
        self.affordances.click(button).await
    }

    pub async fn save_to_note(&self, save_button: &Handle) -> Result<MessageResponse, NoteError> {
        self.affordances.save_to_note(save_button).await
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let registry = self.registry.borrow();
        Diagnostics {
            url: self.page.location().to_string(),
            feed_page: self.scanner.is_active(),
            detail_view: self.page.is_detail_view(),
            scans: self.stats.scans(),
            buttons_added: self.stats.buttons_added(),
            last_scan: self
                .stats
                .last_scan()
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            live_buttons: self.page.select_all(&self.markers.buttons).len(),
            error_buttons: self.page.select_all(&self.markers.error_buttons).len(),
            result_blocks: self.page.select_all(&self.markers.results).len(),
            registered_items: registry.len(),
            archived_results: registry.archived(),
        }
    }

    /// 处理后台或侧栏发来的消息
    pub async fn handle_message(&self, message: Message) -> MessageResponse {
        match message {
            Message::ShowToast { message } => {
                self.notifier.notify(&message);
                MessageResponse::ok()
            }
            Message::TranslateSelectedText { text } => {
                self.selection.handle_translate_request(&text).await
            }
            Message::ToggleSidebar => {
                self.sidebar_open.set(!self.sidebar_open.get());
                MessageResponse::ok()
            }
            Message::CheckSidebar => MessageResponse {
                exists: Some(self.sidebar_open.get()),
                ..MessageResponse::ok()
            },
            other => MessageResponse::failed(format!("内容脚本不处理 {} 消息", other.action())),
        }
    }

    /// 启动触发协调器，必须在 `LocalSet` 中调用
    pub fn start(self: &Rc<Self>) -> TriggerHandle {
        let (coordinator, handle) = Coordinator::new(self.clone(), self.config.triggers.clone());
        if self.scanner.is_active() {
            info!("信息流页面，启动按钮扫描: {}", self.page.location());
        } else {
            info!("非信息流页面，仅启用划词翻译: {}", self.page.location());
        }
        tokio::task::spawn_local(coordinator.run());
        handle
    }
}

impl ScanTarget for Engine {
    fn scan(&self, full_scan: bool) -> ScanReport {
        Engine::scan(self, full_scan)
    }

    fn sweep(&self) {
        Engine::sweep(self)
    }

    fn current_location(&self) -> Url {
        self.page.location()
    }

    /// 登记表只在一个页面内有效
    fn location_changed(&self, url: &Url) {
        if self.page.location() != *url {
            self.page.set_location(url.clone());
        }
        self.registry.borrow_mut().clear();
        self.refresh_observed_regions();
        self.refresh_mutation_roots();
    }

    fn is_detail_view(&self) -> bool {
        self.page.is_detail_view()
    }

    fn mutation_roots(&self, target: &Handle) -> Vec<MutationRoot> {
        if !self.page.is_attached(target) {
            return Vec::new();
        }

        let mut roots = vec![MutationRoot::Body];
        for container in self.observed_containers.borrow().iter() {
            if contains(container, target) {
                roots.push(MutationRoot::Container(Rc::as_ptr(container) as usize));
            }
        }
        roots
    }

    fn is_observed_region(&self, target: &Handle) -> bool {
        self.observed_regions
            .borrow()
            .iter()
            .any(|region| Rc::ptr_eq(region, target))
    }

    fn refresh_observed_regions(&self) {
        let regions: Vec<Handle> = self
            .markers
            .regions
            .iter()
            .flat_map(|selector| self.page.select_all(selector))
            .collect();
        *self.observed_regions.borrow_mut() = regions;
    }

    fn refresh_mutation_roots(&self) {
        let containers: Vec<Handle> = self
            .markers
            .containers
            .iter()
            .flat_map(|selector| self.page.select_all(selector))
            .collect();
        *self.observed_containers.borrow_mut() = containers;
    }
}
