//! 页面模型
//!
//! 一个 `Page` 就是一棵 rcdom 文档树加上当前地址。宿主（浏览器桥接、命令行、测试）
//! 直接修改这棵树，然后通过 `TriggerHandle` 通知引擎。

use std::cell::RefCell;
use std::sync::OnceLock;

use encoding_rs::Encoding;
use markup5ever_rcdom::{Handle, RcDom};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::parsers::html::{
    create_element, get_charset, get_child_node_by_name, html_to_dom, is_attached,
    serialize_document, Selector,
};

fn detail_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(status|tweet)/").expect("static regex"))
}

pub struct Page {
    dom: RcDom,
    location: RefCell<Url>,
    encoding: String,
}

impl Page {
    pub fn new(dom: RcDom, location: Url) -> Self {
        Self {
            dom,
            location: RefCell::new(location),
            encoding: String::new(),
        }
    }

    /// 解析 HTML 字节构造页面，`encoding` 为空时按 UTF-8 处理
    pub fn from_html(data: &[u8], encoding: &str, location: Url) -> Self {
        Self {
            dom: html_to_dom(data, encoding),
            location: RefCell::new(location),
            encoding: encoding.to_string(),
        }
    }

    /// 解析保存下来的页面
    ///
    /// 未指定编码时先按 UTF-8 解析，文档声明了可识别的字符集则按该字符集重新解析。
    pub fn load(data: &[u8], encoding: Option<&str>, location: Url) -> Self {
        if let Some(encoding) = encoding {
            return Self::from_html(data, encoding, location);
        }

        let dom = html_to_dom(data, "utf-8");
        let declared = get_charset(&dom.document)
            .filter(|charset| !charset.is_empty())
            .and_then(|charset| Encoding::for_label_no_replacement(charset.as_bytes()));
        match declared {
            Some(charset) if charset != encoding_rs::UTF_8 => {
                debug!("页面声明字符集 {}，重新解析", charset.name());
                Self::from_html(data, charset.name(), location)
            }
            _ => Self {
                dom,
                location: RefCell::new(location),
                encoding: "utf-8".to_string(),
            },
        }
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn body(&self) -> Option<Handle> {
        let html = get_child_node_by_name(&self.dom.document, "html")?;
        get_child_node_by_name(&html, "body")
    }

    pub fn location(&self) -> Url {
        self.location.borrow().clone()
    }

    pub fn set_location(&self, location: Url) {
        *self.location.borrow_mut() = location;
    }

    pub fn is_attached(&self, node: &Handle) -> bool {
        is_attached(node, &self.dom.document)
    }

    pub fn create_element(&self, tag: &str, attrs: &[(&str, &str)]) -> Handle {
        create_element(&self.dom, tag, attrs)
    }

    pub fn select_all(&self, selector: &Selector) -> Vec<Handle> {
        selector.select_all(&self.dom.document)
    }

    pub fn select_first(&self, selector: &Selector) -> Option<Handle> {
        selector.select_first(&self.dom.document)
    }

    /// 当前主机是否属于给定的信息流站点（含子域名）
    pub fn is_feed_host(&self, hosts: &[String]) -> bool {
        let location = self.location.borrow();
        let Some(host) = location.host_str() else {
            return false;
        };
        hosts
            .iter()
            .any(|feed| host == feed || host.ends_with(&format!(".{}", feed)))
    }

    /// 是否处于单条推文详情页
    pub fn is_detail_view(&self) -> bool {
        detail_path_regex().is_match(self.location.borrow().path())
    }

    pub fn serialize(&self) -> std::io::Result<Vec<u8>> {
        serialize_document(&self.dom.document, &self.encoding)
    }
}
