//! 翻译请求管线
//!
//! 顺序固定：检查密钥 → 检查暂停 → 发出唯一一次请求。超时通过丢弃请求 future 实现，
//! 超时后连接随之关闭，不会在后台继续运行。

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use super::error::{helpers, TranslateError, TranslateResult};
use super::providers::{provider_for, ProviderKind, TranslationProvider};
use super::settings::ProviderConfig;
use crate::config::ProvidersConfig;

/// 响应体在错误详情中保留的最大字符数
const ERROR_BODY_PREFIX: usize = 100;

pub struct Translator {
    client: Client,
    providers: ProvidersConfig,
}

impl Translator {
    pub fn new(providers: ProvidersConfig) -> Self {
        Self::with_client(Client::new(), providers)
    }

    pub fn with_client(client: Client, providers: ProvidersConfig) -> Self {
        Self { client, providers }
    }

    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    pub fn provider(&self, kind: ProviderKind) -> Box<dyn TranslationProvider> {
        provider_for(kind, &self.providers)
    }

    /// 翻译一段文本，失败时已经写过日志
    pub async fn translate(
        &self,
        text: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> TranslateResult<String> {
        let result = self.translate_inner(text, config, timeout).await;
        if let Err(error) = &result {
            helpers::log_error(error);
        }
        result
    }

    async fn translate_inner(
        &self,
        text: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> TranslateResult<String> {
        let provider = self.provider(config.kind);
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());

        if provider.requires_credential() && api_key.is_none() {
            return Err(TranslateError::Configuration {
                provider: config.kind,
            });
        }

        if !config.enabled {
            return Err(TranslateError::Paused);
        }

        let request = provider.build_request(&self.client, text, api_key)?;
        debug!(
            "发送翻译请求: {} {} ({} 字符)",
            config.kind,
            request.url(),
            text.chars().count()
        );

        let call = async {
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| TranslateError::network(config.kind, e))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| TranslateError::network(config.kind, e))?;

            if !status.is_success() {
                return Err(TranslateError::Remote {
                    provider: config.kind,
                    status: Some(status.as_u16()),
                    detail: body.chars().take(ERROR_BODY_PREFIX).collect(),
                });
            }

            provider.parse_response(&body)
        };

        let translated = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| TranslateError::Timeout {
                provider: config.kind,
                timeout,
            })??;

        info!("翻译完成: {} ({} 字符)", config.kind, translated.chars().count());
        Ok(translated)
    }
}
