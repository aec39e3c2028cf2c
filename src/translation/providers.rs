//! 翻译服务
//!
//! 每个服务只负责两件事：构造请求、解析响应。发送、超时和错误归类在 `pipeline` 中统一处理。

use std::fmt;
use std::str::FromStr;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::{TranslateError, TranslateResult};
use crate::config::{EndpointConfig, ProvidersConfig};
use crate::parsers::html::is_mostly_chinese;

/// 翻译服务标识
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Deepseek,
    Kimi,
    Openai,
    GoogleFree,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Deepseek,
        ProviderKind::Kimi,
        ProviderKind::Openai,
        ProviderKind::GoogleFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Kimi => "kimi",
            ProviderKind::Openai => "openai",
            ProviderKind::GoogleFree => "google-free",
        }
    }

    /// 结果块中显示的名称
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "Deepseek",
            ProviderKind::Kimi => "Kimi",
            ProviderKind::Openai => "Openai",
            ProviderKind::GoogleFree => "Google",
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderKind::GoogleFree)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的翻译服务: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// 单个翻译服务的请求构造与响应解析
pub trait TranslationProvider {
    fn kind(&self) -> ProviderKind;

    fn requires_credential(&self) -> bool {
        self.kind().requires_credential()
    }

    fn build_request(
        &self,
        client: &Client,
        text: &str,
        api_key: Option<&str>,
    ) -> TranslateResult<Request>;

    fn parse_response(&self, body: &str) -> TranslateResult<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 兼容 chat-completions 协议的服务
pub struct ChatCompletionProvider {
    kind: ProviderKind,
    endpoint: EndpointConfig,
    instruction: String,
    max_tokens: u32,
}

impl ChatCompletionProvider {
    pub fn new(kind: ProviderKind, endpoint: EndpointConfig, instruction: &str, max_tokens: u32) -> Self {
        Self {
            kind,
            endpoint,
            instruction: instruction.to_string(),
            max_tokens,
        }
    }
}

impl TranslationProvider for ChatCompletionProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn build_request(
        &self,
        client: &Client,
        text: &str,
        api_key: Option<&str>,
    ) -> TranslateResult<Request> {
        let api_key = api_key.ok_or(TranslateError::Configuration { provider: self.kind })?;

        let body = ChatRequest {
            model: &self.endpoint.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            stream: false,
            max_tokens: self.max_tokens,
        };
        let body = serde_json::to_string(&body)
            .map_err(|e| TranslateError::malformed(self.kind, format!("请求序列化失败: {}", e)))?;

        client
            .post(&self.endpoint.url)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(|e| TranslateError::network(self.kind, e))
    }

    fn parse_response(&self, body: &str) -> TranslateResult<String> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| TranslateError::malformed(self.kind, format!("响应解析失败: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| TranslateError::malformed(self.kind, "响应中没有 choices[0].message.content"))
    }
}

/// 免密钥的公共翻译接口
pub struct GoogleFreeProvider {
    url: String,
}

impl GoogleFreeProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// 中文为主译成英文，其余译成中文
    pub fn target_language(text: &str) -> &'static str {
        if is_mostly_chinese(text) {
            "en"
        } else {
            "zh-CN"
        }
    }
}

impl TranslationProvider for GoogleFreeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleFree
    }

    fn build_request(
        &self,
        client: &Client,
        text: &str,
        _api_key: Option<&str>,
    ) -> TranslateResult<Request> {
        client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", Self::target_language(text)),
                ("dt", "t"),
                ("q", text),
            ])
            .build()
            .map_err(|e| TranslateError::network(ProviderKind::GoogleFree, e))
    }

    fn parse_response(&self, body: &str) -> TranslateResult<String> {
        let data: serde_json::Value = serde_json::from_str(body).map_err(|e| {
            TranslateError::malformed(ProviderKind::GoogleFree, format!("响应解析失败: {}", e))
        })?;

        let segments = data
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or_else(|| TranslateError::malformed(ProviderKind::GoogleFree, "缺少翻译分段"))?;

        let translated: String = segments
            .iter()
            .filter_map(|segment| segment.get(0).and_then(|s| s.as_str()))
            .collect();

        if translated.trim().is_empty() {
            return Err(TranslateError::malformed(ProviderKind::GoogleFree, "翻译结果为空"));
        }
        Ok(translated)
    }
}

/// 根据服务标识选择实现
pub fn provider_for(kind: ProviderKind, config: &ProvidersConfig) -> Box<dyn TranslationProvider> {
    let chat = |endpoint: &EndpointConfig| {
        Box::new(ChatCompletionProvider::new(
            kind,
            endpoint.clone(),
            &config.instruction,
            config.max_tokens,
        )) as Box<dyn TranslationProvider>
    };

    match kind {
        ProviderKind::Deepseek => chat(&config.deepseek),
        ProviderKind::Kimi => chat(&config.kimi),
        ProviderKind::Openai => chat(&config.openai),
        ProviderKind::GoogleFree => Box::new(GoogleFreeProvider::new(&config.google_free_url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!("deepseek".parse::<ProviderKind>().unwrap(), ProviderKind::Deepseek);
        assert_eq!(" Google-Free ".parse::<ProviderKind>().unwrap(), ProviderKind::GoogleFree);
        assert!("bing".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::GoogleFree.label(), "Google");
        assert!(!ProviderKind::GoogleFree.requires_credential());
        assert!(ProviderKind::Kimi.requires_credential());
    }

    #[test]
    fn test_chat_request_shape() {
        let config = ProvidersConfig::default();
        let provider = provider_for(ProviderKind::Deepseek, &config);
        let client = Client::new();

        let request = provider
            .build_request(&client, "Hello world", Some("sk-test"))
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), config.deepseek.url);
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer sk-test"
        );

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello world");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 150);
    }

    #[test]
    fn test_chat_request_requires_key() {
        let provider = provider_for(ProviderKind::Openai, &ProvidersConfig::default());
        let err = provider
            .build_request(&Client::new(), "Hello", None)
            .unwrap_err();
        assert!(matches!(err, TranslateError::Configuration { .. }));
    }

    #[test]
    fn test_chat_response_parsing() {
        let provider = provider_for(ProviderKind::Kimi, &ProvidersConfig::default());
        assert_eq!(
            provider
                .parse_response(r#"{"choices":[{"message":{"content":"  你好，世界 "}}]}"#)
                .unwrap(),
            "你好，世界"
        );
        assert!(provider.parse_response(r#"{"choices":[]}"#).is_err());
        assert!(provider.parse_response("<html>").is_err());
    }

    #[test]
    fn test_google_request_and_parsing() {
        let provider = GoogleFreeProvider::new("https://translate.example/single");
        let request = provider
            .build_request(&Client::new(), "你好世界", None)
            .unwrap();
        let query: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("tl".to_string(), "en".to_string())));
        assert!(query.contains(&("q".to_string(), "你好世界".to_string())));
        assert_eq!(GoogleFreeProvider::target_language("Hello"), "zh-CN");

        let body = r#"[[["你好，","Hello, ",null],["世界","world",null]],null,"en"]"#;
        assert_eq!(provider.parse_response(body).unwrap(), "你好，世界");
        assert!(provider.parse_response("[null]").is_err());
    }
}
