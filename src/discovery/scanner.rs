//! 发现扫描器
//!
//! 扫描是幂等的：同一棵没有变化的文档树上连续扫描，第二次不会新增任何按钮。
//! 去重不靠互斥，而是每个候选节点都经过同样的检查：
//! 文本长度 → 已有按钮 → 已有结果 → 已处理标记 → 登记表状态。

use std::rc::Rc;
use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::{debug, info, trace};

use super::strategies::StrategySet;
use crate::affordance::{container_of, item_text, AffordanceManager};
use crate::config::constants::{BUTTON_CLASS, ITEM_ID_ATTR, PROCESSED_ATTR, RESULT_CLASS};
use crate::config::DiscoveryConfig;
use crate::page::Page;
use crate::parsers::html::{
    ancestors, descendants, get_node_attr, get_parent_node, has_class, set_node_attr,
    text_content, Selector, SelectorError,
};
use crate::registry::{ItemId, ItemStatus, SharedRegistry};

/// 失败文案的公共前缀，出现在条目或其父节点文本中说明已经有过一次尝试
const FAILURE_MARKER: &str = "[翻译失败";

fn permalink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/status/(\d+)").expect("static regex"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates_seen: usize,
    pub affordances_added: usize,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.candidates_seen += other.candidates_seen;
        self.affordances_added += other.affordances_added;
    }
}

/// 候选节点被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    HasButton,
    HasResult,
    AlreadyProcessed,
    AlreadyRegistered,
}

pub struct Scanner {
    page: Rc<Page>,
    registry: SharedRegistry,
    affordances: Rc<AffordanceManager>,
    strategies: StrategySet,
    min_text_length: usize,
    feed_hosts: Vec<String>,
    permalink: Selector,
}

impl Scanner {
    pub fn new(
        page: Rc<Page>,
        registry: SharedRegistry,
        affordances: Rc<AffordanceManager>,
        config: &DiscoveryConfig,
    ) -> Result<Self, SelectorError> {
        Ok(Self {
            page,
            registry,
            affordances,
            strategies: StrategySet::from_config(config)?,
            min_text_length: config.min_text_length,
            feed_hosts: config.feed_hosts.clone(),
            permalink: Selector::parse("a[href]")?,
        })
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn is_active(&self) -> bool {
        self.page.is_feed_host(&self.feed_hosts)
    }

    /// 扫描当前文档；`full_scan` 在详情页额外补扫主推文
    pub fn scan(&self, full_scan: bool) -> ScanReport {
        if !self.is_active() {
            trace!("非信息流页面，跳过扫描");
            return ScanReport::default();
        }

        let mut report = ScanReport::default();
        for selector in &self.strategies.primary {
            let candidates = self.page.select_all(selector);
            let mut added = 0;
            for node in &candidates {
                if self.process(node) {
                    added += 1;
                }
            }
            debug!("选择器 \"{}\" 找到 {} 个候选，新增 {} 个按钮", selector, candidates.len(), added);
            report.merge(ScanReport {
                candidates_seen: candidates.len(),
                affordances_added: added,
            });
        }

        if full_scan && self.page.is_detail_view() {
            report.merge(self.scan_detail_view());
        }

        if report.candidates_seen > 0 || report.affordances_added > 0 {
            info!(
                "本次扫描共找到 {} 个候选，添加了 {} 个翻译按钮",
                report.candidates_seen, report.affordances_added
            );
        }
        report
    }

    /// 每个详情页选择器最多处理一个条目
    fn scan_detail_view(&self) -> ScanReport {
        let mut report = ScanReport::default();
        for selector in &self.strategies.detail {
            let eligible = self
                .page
                .select_all(selector)
                .into_iter()
                .find(|node| self.check(node).is_ok());

            if let Some(node) = eligible {
                report.candidates_seen += 1;
                if self.process(&node) {
                    debug!("详情页主推文已添加按钮: {}", selector);
                    report.affordances_added += 1;
                }
            }
        }
        report
    }

    fn process(&self, node: &Handle) -> bool {
        let container = match self.check(node) {
            Ok(container) => container,
            Err(rejection) => {
                trace!("跳过候选: {:?}", rejection);
                return false;
            }
        };

        let id = self.resolve_id(node, &container);
        if let Err(rejection) = self.check_registry(&id) {
            trace!("跳过候选 {}: {:?}", id, rejection);
            return false;
        }

        set_node_attr(&container, PROCESSED_ATTR, Some("true"));
        let button = self.affordances.create_button(&id, node);
        if self.affordances.restore_result(&id, node, &button) {
            debug!("条目 {} 重新出现，直接显示已有翻译", id);
        }
        true
    }

    /// 结构检查，通过时返回条目所在的结构容器
    pub fn check(&self, node: &Handle) -> Result<Handle, Rejection> {
        if item_text(node).chars().count() < self.min_text_length {
            return Err(Rejection::TooShort);
        }

        let container = container_of(&self.strategies.container, node);
        let parent = get_parent_node(node);

        let scopes = [Some(node.clone()), parent.clone(), Some(container.clone())];
        let has_button = scopes
            .iter()
            .flatten()
            .any(|scope| descendants(scope).iter().any(|n| has_class(n, BUTTON_CLASS)));
        if has_button {
            return Err(Rejection::HasButton);
        }

        let result_scope = parent.unwrap_or_else(|| node.clone());
        let has_result = descendants(&result_scope)
            .iter()
            .any(|n| has_class(n, RESULT_CLASS))
            || text_content(&result_scope, |_| false).contains(FAILURE_MARKER);
        if has_result {
            return Err(Rejection::HasResult);
        }

        let processed = ancestors(node)
            .iter()
            .take_while(|n| !Rc::ptr_eq(*n, &container))
            .chain(std::iter::once(&container))
            .any(|n| get_node_attr(n, PROCESSED_ATTR).as_deref() == Some("true"));
        if processed {
            return Err(Rejection::AlreadyProcessed);
        }

        Ok(container)
    }

    /// 已挂过按钮的条目跳过，除非登记的节点已经不在文档中
    fn check_registry(&self, id: &ItemId) -> Result<(), Rejection> {
        let registry = self.registry.borrow();
        match registry.get(id) {
            Some(item)
                if item.status >= ItemStatus::AffordanceShown
                    && item.is_live(self.page.document()) =>
            {
                Err(Rejection::AlreadyRegistered)
            }
            _ => Ok(()),
        }
    }

    /// 解析条目 id 并写回节点
    ///
    /// 顺序：节点上已有的 id → 容器的原生 id 属性 → 永久链接中的状态编号 → 生成的 uuid
    pub fn resolve_id(&self, node: &Handle, container: &Handle) -> ItemId {
        if let Some(existing) = get_node_attr(node, ITEM_ID_ATTR) {
            return ItemId::new(existing);
        }

        let native = if Rc::ptr_eq(node, container) {
            None
        } else {
            ["data-item-id", "id"]
                .iter()
                .find_map(|attr| get_node_attr(container, attr))
                .filter(|value| !value.trim().is_empty())
        };

        let id = native
            .or_else(|| self.permalink_id(container))
            .unwrap_or_else(|| format!("tweet-{}", uuid::Uuid::new_v4().simple()));

        set_node_attr(node, ITEM_ID_ATTR, Some(&id));
        ItemId::new(id)
    }

    fn permalink_id(&self, container: &Handle) -> Option<String> {
        self.permalink
            .select_all(container)
            .iter()
            .filter_map(|link| get_node_attr(link, "href"))
            .find_map(|href| {
                permalink_regex()
                    .captures(&href)
                    .and_then(|caps| caps.get(1))
                    .map(|m| format!("status-{}", m.as_str()))
            })
    }
}
