//! # 按钮生命周期
//!
//! - `state`: 按钮状态机，读写在元素上
//! - `liveness`: 挂起点之后的存活检查
//! - `manager`: 创建按钮、处理点击、渲染结果

pub mod liveness;
pub mod manager;
pub mod state;

use markup5ever_rcdom::Handle;

use crate::config::constants::{BUTTON_CLASS, IDLE_LABEL, RESULT_CLASS};
use crate::parsers::html::{has_class, text_content, Selector};

pub use liveness::{Liveness, StaleReason};
pub use manager::{AffordanceManager, ClickOutcome};
pub use state::ButtonState;

/// 条目正文，不含按钮与结果块
pub fn item_text(node: &Handle) -> String {
    let text = text_content(node, |n| has_class(n, BUTTON_CLASS) || has_class(n, RESULT_CLASS));
    let text = text.trim();
    text.strip_suffix(IDLE_LABEL).unwrap_or(text).trim().to_string()
}

/// 条目所在的结构容器，找不到时就是节点本身
pub fn container_of(selector: &Selector, node: &Handle) -> Handle {
    selector.closest(node).unwrap_or_else(|| node.clone())
}
