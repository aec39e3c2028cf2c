//! 后台侧的消息处理
//!
//! 内容脚本所在的源无法跨域写入笔记服务，由后台代发 `POST {content}`。

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use super::{DeliveryError, Message, MessageResponse, MessageTransport};

/// 笔记服务转发
pub struct NoteRelay {
    client: Client,
}

impl Default for NoteRelay {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl NoteRelay {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn save(&self, endpoint: &str, content: &str) -> MessageResponse {
        info!("收到保存到Flomo请求: {}", endpoint);

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(json!({ "content": content }).to_string())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                warn!("保存到Flomo失败: {}", error);
                return MessageResponse::failed(error.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("保存到Flomo失败: HTTP {}", status.as_u16());
            return MessageResponse::failed(format!("Status: {}", status.as_u16()));
        }

        match response.text().await {
            Ok(data) => {
                info!("Flomo API成功响应");
                MessageResponse::with_data(data)
            }
            Err(error) => MessageResponse::failed(error.to_string()),
        }
    }
}

/// 进程内的后台端，直接处理消息
#[derive(Default)]
pub struct LocalBackground {
    notes: NoteRelay,
}

impl LocalBackground {
    pub fn new(notes: NoteRelay) -> Self {
        Self { notes }
    }
}

#[async_trait(?Send)]
impl MessageTransport for LocalBackground {
    async fn send(&self, message: &Message) -> Result<MessageResponse, DeliveryError> {
        match message {
            Message::SaveToFlomo { flomo_api, content } => {
                Ok(self.notes.save(flomo_api, content).await)
            }
            Message::UpdateSidebar => Ok(MessageResponse::ok()),
            other => Ok(MessageResponse::failed(format!(
                "后台不处理 {} 消息",
                other.action()
            ))),
        }
    }
}
