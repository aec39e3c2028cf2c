//! 用户提示

use std::rc::Rc;

use tracing::info;

use crate::config::constants::TOAST_CLASS;
use crate::page::Page;
use crate::parsers::html::{append_child, set_text, Selector};

pub trait Notifier {
    fn notify(&self, message: &str);
}

/// 只写日志
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!("提示: {}", message);
    }
}

/// 在页面 body 中维护唯一的提示元素
pub struct ToastNotifier {
    page: Rc<Page>,
    selector: Selector,
}

impl ToastNotifier {
    pub fn new(page: Rc<Page>) -> Self {
        Self {
            page,
            selector: Selector::parse(&format!("div.{}", TOAST_CLASS)).expect("static selector"),
        }
    }
}

impl Notifier for ToastNotifier {
    fn notify(&self, message: &str) {
        info!("提示: {}", message);

        let toast = match self.page.select_first(&self.selector) {
            Some(existing) => existing,
            None => {
                let Some(body) = self.page.body() else {
                    return;
                };
                let toast = self.page.create_element("div", &[("class", TOAST_CLASS)]);
                append_child(&body, &toast);
                toast
            }
        };
        set_text(&toast, message);
    }
}
