//! # 解析器模块
//!
//! 页面以 html5ever / rcdom 树的形式存在，本模块提供在这棵树上工作的全部基础能力：
//!
//! - `html` - HTML文档解析、DOM操作、结构选择器、序列化

pub mod html;

pub use html::{html_to_dom, serialize_document, Selector, SelectorError};
