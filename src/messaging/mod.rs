//! 跨进程消息
//!
//! 内容脚本与后台之间的消息格式、投递重试以及后台侧的笔记转发。

pub mod notes;
pub mod relay;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use notes::{note_content, save_note, NoteError};
pub use relay::{LocalBackground, NoteRelay};
pub use retry::{deliver, failure_detail, send_with_retry};

/// 消息体，`action` 字段区分类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    ToggleSidebar,
    CheckSidebar,
    TranslateSelectedText {
        text: String,
    },
    SaveToFlomo {
        #[serde(rename = "flomoApi")]
        flomo_api: String,
        content: String,
    },
    ShowToast {
        message: String,
    },
    UpdateSidebar,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::ToggleSidebar => "toggleSidebar",
            Message::CheckSidebar => "checkSidebar",
            Message::TranslateSelectedText { .. } => "translateSelectedText",
            Message::SaveToFlomo { .. } => "saveToFlomo",
            Message::ShowToast { .. } => "showToast",
            Message::UpdateSidebar => "updateSidebar",
        }
    }
}

/// 消息应答
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            ..Self::default()
        }
    }
}

/// 接收端尚未就绪等投递层失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("消息未送达: {0}")]
pub struct DeliveryError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("{action} 在 {attempts} 次尝试后仍未送达: {last_error}")]
    Exhausted {
        action: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("{action} 被接收端拒绝: {reason}")]
    Rejected {
        action: &'static str,
        reason: String,
    },
}

/// 消息投递通道
#[async_trait(?Send)]
pub trait MessageTransport {
    async fn send(&self, message: &Message) -> Result<MessageResponse, DeliveryError>;
}
