//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（解析、属性、挂载与移除）
//! - `selector`: 结构选择器
//! - `serializer`: 序列化功能
//! - `utils`: 文本工具函数和常量

pub mod dom;
pub mod selector;
pub mod serializer;
pub mod utils;

pub use dom::{
    add_class, ancestors, append_child, contains, create_element, create_text, descendants, detach,
    get_charset, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, has_class, html_to_dom,
    is_attached, is_element, remove_class, set_node_attr, set_text, text_content, Detach,
};
pub use selector::{Selector, SelectorError};
pub use serializer::serialize_document;
pub use utils::{is_mostly_chinese, normalize_whitespace, WHITESPACES};
