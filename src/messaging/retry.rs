use tracing::{debug, warn};

use super::{DeliveryError, Message, MessageResponse, MessageTransport, MessagingError};
use crate::config::MessagingConfig;
use crate::notify::Notifier;

const EXHAUSTED_HINT: &str = "多次尝试后仍失败，请刷新页面或检查扩展权限";

/// 带固定间隔重试的消息投递，不做任何提示
///
/// 只有投递失败才会重试；接收端明确返回 `success: false` 时立即返回 `Rejected`。
pub async fn deliver(
    transport: &dyn MessageTransport,
    message: &Message,
    config: &MessagingConfig,
) -> Result<MessageResponse, MessagingError> {
    let action = message.action();
    let attempts = config.retry_attempts.max(1);
    let mut last_error = DeliveryError(String::new());

    for attempt in 1..=attempts {
        match transport.send(message).await {
            Ok(response) if response.success => {
                debug!("消息 {} 已送达（第 {} 次）", action, attempt);
                return Ok(response);
            }
            Ok(response) => {
                let reason = response
                    .error
                    .clone()
                    .unwrap_or_else(|| "未知错误".to_string());
                warn!("消息 {} 被拒绝: {}", action, reason);
                return Err(MessagingError::Rejected { action, reason });
            }
            Err(error) => {
                warn!("第 {} 次发送 {} 失败: {}", attempt, action, error);
                last_error = error;
                if attempt < attempts {
                    tokio::time::sleep(config.retry_interval()).await;
                }
            }
        }
    }

    warn!("消息 {} 达到最大重试次数 ({})，放弃", action, attempts);
    Err(MessagingError::Exhausted {
        action,
        attempts,
        last_error: last_error.0,
    })
}

/// 侧栏消息发送：重试用尽或被拒绝后才提示用户
pub async fn send_with_retry(
    transport: &dyn MessageTransport,
    message: &Message,
    config: &MessagingConfig,
    notifier: &dyn Notifier,
) -> Result<MessageResponse, MessagingError> {
    deliver(transport, message, config).await.map_err(|error| {
        notifier.notify(&format!("侧栏操作失败：{}", failure_detail(&error)));
        error
    })
}

/// 给用户看的失败原因
pub fn failure_detail(error: &MessagingError) -> &str {
    match error {
        MessagingError::Rejected { reason, .. } => reason,
        MessagingError::Exhausted { last_error, .. } if !last_error.is_empty() => last_error,
        MessagingError::Exhausted { .. } => EXHAUSTED_HINT,
    }
}
