//! 按钮状态机
//!
//! 状态保存在按钮元素本身（文案、`disabled`、样式类、错误时间戳），按钮销毁时状态随之消失。

use markup5ever_rcdom::Handle;

use crate::config::constants::{
    BUTTON_ERROR_CLASS, BUTTON_LOADING_CLASS, ERROR_TIME_ATTR, IDLE_LABEL, LOADING_LABEL,
};
use crate::parsers::html::{
    add_class, get_node_attr, has_class, remove_class, set_node_attr, set_text, text_content,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Loading,
    Error { message: String, since_ms: i64 },
}

impl ButtonState {
    pub fn error_now(message: impl Into<String>) -> Self {
        ButtonState::Error {
            message: message.into(),
            since_ms: now_ms(),
        }
    }

    /// 从按钮元素读取当前状态
    pub fn read(button: &Handle) -> Self {
        if has_class(button, BUTTON_ERROR_CLASS) {
            let since_ms = get_node_attr(button, ERROR_TIME_ATTR)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0);
            return ButtonState::Error {
                message: text_content(button, |_| false),
                since_ms,
            };
        }

        if get_node_attr(button, "disabled").is_some() || has_class(button, BUTTON_LOADING_CLASS) {
            return ButtonState::Loading;
        }

        ButtonState::Idle
    }

    pub fn apply(&self, button: &Handle) {
        match self {
            ButtonState::Idle => {
                set_text(button, IDLE_LABEL);
                set_node_attr(button, "disabled", None);
                set_node_attr(button, ERROR_TIME_ATTR, None);
                remove_class(button, BUTTON_LOADING_CLASS);
                remove_class(button, BUTTON_ERROR_CLASS);
            }
            ButtonState::Loading => {
                set_text(button, LOADING_LABEL);
                set_node_attr(button, "disabled", Some(""));
                set_node_attr(button, ERROR_TIME_ATTR, None);
                remove_class(button, BUTTON_ERROR_CLASS);
                add_class(button, BUTTON_LOADING_CLASS);
            }
            ButtonState::Error { message, since_ms } => {
                set_text(button, message);
                set_node_attr(button, "disabled", None);
                set_node_attr(button, ERROR_TIME_ATTR, Some(&since_ms.to_string()));
                remove_class(button, BUTTON_LOADING_CLASS);
                add_class(button, BUTTON_ERROR_CLASS);
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ButtonState::Loading)
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
