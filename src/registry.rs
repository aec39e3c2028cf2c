//! 内容条目登记表
//!
//! 记录哪些条目已经被发现、挂过按钮以及它们的翻译结果。登记表只持有节点的弱引用，
//! 节点随时可能被页面移除。

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::is_attached;
use crate::translation::ProviderKind;

/// 会话内稳定的条目标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// 条目状态，顺序即生命周期先后
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemStatus {
    Discovered,
    AffordanceShown,
    Translating,
    Translated,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Discovered => "discovered",
            ItemStatus::AffordanceShown => "affordance-shown",
            ItemStatus::Translating => "translating",
            ItemStatus::Translated => "translated",
            ItemStatus::Failed => "failed",
        }
    }
}

/// 一次成功翻译的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    pub item_id: ItemId,
    pub original_text: String,
    pub translated_text: String,
    pub provider: ProviderKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: ItemId,
    node: Weak<Node>,
    pub status: ItemStatus,
    pub result: Option<TranslationRecord>,
}

impl ContentItem {
    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }

    /// 节点仍存活且挂在文档上
    pub fn is_live(&self, document: &Handle) -> bool {
        self.node()
            .map(|node| is_attached(&node, document))
            .unwrap_or(false)
    }
}

/// `upsert` 使用的局部更新
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    node: Option<Weak<Node>>,
    status: Option<ItemStatus>,
    result: Option<TranslationRecord>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: &Handle) -> Self {
        self.node = Some(Rc::downgrade(node));
        self
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn result(mut self, result: TranslationRecord) -> Self {
        self.result = Some(result);
        self
    }
}

#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: HashMap<ItemId, ContentItem>,
    archive: HashMap<ItemId, TranslationRecord>,
}

pub type SharedRegistry = Rc<RefCell<ItemRegistry>>;

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn has(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&ContentItem> {
        self.items.get(id)
    }

    /// 新建或更新条目；同一 patch 重复应用结果不变
    pub fn upsert(&mut self, id: &ItemId, patch: ItemPatch) -> &ContentItem {
        let item = self
            .items
            .entry(id.clone())
            .or_insert_with(|| ContentItem {
                id: id.clone(),
                node: Weak::new(),
                status: ItemStatus::Discovered,
                result: None,
            });

        if let Some(node) = patch.node {
            item.node = node;
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        if let Some(result) = patch.result {
            item.result = Some(result);
        }
        item
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<ContentItem> {
        self.items.remove(id)
    }

    /// 清空所有条目与会话内的翻译存档
    pub fn clear(&mut self) {
        self.items.clear();
        self.archive.clear();
    }

    /// 移除节点已不在文档中的条目，翻译结果转入存档
    pub fn prune_detached(&mut self, document: &Handle) -> Vec<ItemId> {
        let stale: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| !item.is_live(document))
            .map(|item| item.id.clone())
            .collect();

        for id in &stale {
            if let Some(item) = self.items.remove(id) {
                if let Some(result) = item.result {
                    self.archive.insert(id.clone(), result);
                }
            }
        }
        stale
    }

    /// 当前条目或存档中的翻译结果
    pub fn result_for(&self, id: &ItemId) -> Option<&TranslationRecord> {
        self.items
            .get(id)
            .and_then(|item| item.result.as_ref())
            .or_else(|| self.archive.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn archived(&self) -> usize {
        self.archive.len()
    }

    pub fn count_with_status(&self, status: ItemStatus) -> usize {
        self.items.values().filter(|item| item.status == status).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::{append_child, create_element, detach, html_to_dom};

    fn record(id: &str, text: &str) -> TranslationRecord {
        TranslationRecord {
            item_id: ItemId::from(id),
            original_text: "Hello world".to_string(),
            translated_text: text.to_string(),
            provider: ProviderKind::Deepseek,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dom = html_to_dom(b"<div></div>", "utf-8");
        let node = create_element(&dom, "div", &[]);
        let id = ItemId::from("status-1");
        let mut registry = ItemRegistry::new();

        let patch = ItemPatch::new().node(&node).status(ItemStatus::AffordanceShown);
        registry.upsert(&id, patch.clone());
        registry.upsert(&id, patch);

        assert_eq!(registry.len(), 1);
        let item = registry.get(&id).unwrap();
        assert_eq!(item.status, ItemStatus::AffordanceShown);
        assert!(Rc::ptr_eq(&item.node().unwrap(), &node));
    }

    #[test]
    fn test_partial_patch_keeps_other_fields() {
        let dom = html_to_dom(b"<div></div>", "utf-8");
        let node = create_element(&dom, "div", &[]);
        let id = ItemId::from("a");
        let mut registry = ItemRegistry::new();

        registry.upsert(&id, ItemPatch::new().node(&node));
        registry.upsert(&id, ItemPatch::new().status(ItemStatus::Translated));

        let item = registry.get(&id).unwrap();
        assert!(item.node().is_some());
        assert_eq!(item.status, ItemStatus::Translated);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut registry = ItemRegistry::new();
        let id = ItemId::from("a");
        registry.upsert(&id, ItemPatch::new().result(record("a", "你好")));
        registry.clear();

        assert!(!registry.has(&id));
        assert!(registry.result_for(&id).is_none());
    }

    #[test]
    fn test_prune_detached_archives_results() {
        let dom = html_to_dom(b"<html><body></body></html>", "utf-8");
        let body = crate::parsers::html::get_child_node_by_name(
            &crate::parsers::html::get_child_node_by_name(&dom.document, "html").unwrap(),
            "body",
        )
        .unwrap();
        let live = create_element(&dom, "div", &[]);
        let gone = create_element(&dom, "div", &[]);
        append_child(&body, &live);
        append_child(&body, &gone);

        let mut registry = ItemRegistry::new();
        registry.upsert(&ItemId::from("live"), ItemPatch::new().node(&live));
        registry.upsert(
            &ItemId::from("gone"),
            ItemPatch::new().node(&gone).result(record("gone", "你好")),
        );

        detach(&gone, &dom.document);
        let pruned = registry.prune_detached(&dom.document);

        assert_eq!(pruned, vec![ItemId::from("gone")]);
        assert!(registry.has(&ItemId::from("live")));
        assert_eq!(
            registry.result_for(&ItemId::from("gone")).unwrap().translated_text,
            "你好"
        );
        assert_eq!(registry.archived(), 1);
    }

    #[test]
    fn test_status_order() {
        assert!(ItemStatus::Failed > ItemStatus::AffordanceShown);
        assert!(ItemStatus::Discovered < ItemStatus::AffordanceShown);
        assert_eq!(ItemStatus::Translating.as_str(), "translating");
    }
}
