//! 挂起点之后的存活检查
//!
//! 每次 await 返回后都要重新确认：条目节点仍在文档中、按钮仍在、没有别的结果块抢先挂上。

use markup5ever_rcdom::Handle;

use crate::config::constants::RESULT_CLASS;
use crate::page::Page;
use crate::parsers::html::{descendants, get_parent_node, has_class};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    NodeDetached,
    ButtonDetached,
    CompetingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Stale(StaleReason),
}

impl Liveness {
    pub fn is_live(&self) -> bool {
        matches!(self, Liveness::Live)
    }
}

pub fn check(page: &Page, node: &Handle, button: Option<&Handle>) -> Liveness {
    if !page.is_attached(node) {
        return Liveness::Stale(StaleReason::NodeDetached);
    }

    if let Some(button) = button {
        if !page.is_attached(button) {
            return Liveness::Stale(StaleReason::ButtonDetached);
        }
    }

    if has_result_block(node) {
        return Liveness::Stale(StaleReason::CompetingResult);
    }

    Liveness::Live
}

/// 结果块挂在条目节点的父节点下，检查父节点（没有父节点时检查自身）
pub fn has_result_block(node: &Handle) -> bool {
    let scope = get_parent_node(node).unwrap_or_else(|| node.clone());
    descendants(&scope)
        .iter()
        .any(|candidate| has_class(candidate, RESULT_CLASS))
}
