//! 保存到 Flomo
//!
//! 结果块和划词弹窗共用同一个流程：检查端点 → 提示 → 交给后台转发 → 提示结果。

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::retry::{deliver, failure_detail};
use super::{Message, MessageResponse, MessageTransport, MessagingError};
use crate::config::MessagingConfig;
use crate::notify::Notifier;

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("按钮不在翻译结果中")]
    NotAResultBlock,

    #[error("条目 {0} 没有翻译记录")]
    MissingRecord(String),

    #[error("未配置 Flomo API 端点")]
    NoEndpoint,

    #[error("没有可用的后台通道")]
    NoMessenger,

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// 笔记正文：原文、译文、标签和来源页面
pub fn note_content(original: &str, translated: &str, location: &Url) -> String {
    format!("{}\n{} #flomo {}", original, translated, location)
}

/// 投递失败按 `config` 重试，重试用尽后才提示保存失败
pub async fn save_note(
    messenger: Option<&dyn MessageTransport>,
    config: &MessagingConfig,
    notifier: &dyn Notifier,
    endpoint: Option<&str>,
    content: String,
) -> Result<MessageResponse, NoteError> {
    let Some(endpoint) = endpoint else {
        notifier.notify("请在侧栏设置中绑定 Flomo API 端点");
        return Err(NoteError::NoEndpoint);
    };
    let Some(messenger) = messenger else {
        notifier.notify("保存失败：后台不可用");
        return Err(NoteError::NoMessenger);
    };

    notifier.notify("正在保存到 Flomo...");
    let message = Message::SaveToFlomo {
        flomo_api: endpoint.to_string(),
        content,
    };

    match deliver(messenger, &message, config).await {
        Ok(response) => {
            info!("已保存到 Flomo");
            notifier.notify("成功保存到 Flomo！");
            Ok(response)
        }
        Err(error) => {
            warn!("保存到 Flomo 失败: {}", error);
            notifier.notify(&format!("保存失败：{}", failure_detail(&error)));
            Err(NoteError::Messaging(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    #[test]
    fn test_note_content_layout() {
        let url = Url::parse("https://x.com/jack/status/20").unwrap();
        assert_eq!(
            note_content("just setting up", "刚刚开通", &url),
            "just setting up\n刚刚开通 #flomo https://x.com/jack/status/20"
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_sends_nothing() {
        let err = save_note(
            None,
            &MessagingConfig::default(),
            &LogNotifier,
            None,
            "x".to_string(),
        )
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::NoEndpoint));
    }
}
