use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::ProviderConfig,
    error::{ProxyError, UpstreamError},
    model::{ChatHistory, ChatMessage, ChatRole},
    provider::ProviderId,
};

use super::{ChatProvider, transport_error, upstream_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat completions client. The whole history goes out as one flat message list.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    api_key: String,
    base_url: String,
    model: String,
    http: Client,
}

impl OpenAiChat {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http: Client::new(),
        }
    }

    pub fn from_config(cfg: &ProviderConfig) -> Self {
        let mut chat = Self::new(cfg.api_key.clone());
        if let Some(base_url) = &cfg.base_url {
            chat = chat.with_base_url(base_url);
        }
        if let Some(model) = &cfg.model {
            chat.model = model.clone();
        }
        chat
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn reply(&self, history: &ChatHistory) -> Result<String, ProxyError> {
        info!(model = %self.model, "attempting AI analysis with OpenAI");

        let request = CompletionRequest {
            model: &self.model,
            messages: history.iter().map(OpenAiMessage::from).collect(),
        };

        let res = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::OpenAi, e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| transport_error(ProviderId::OpenAi, e))?;

        if !status.is_success() {
            return Err(upstream_error(ProviderId::OpenAi, status.as_u16(), &body).into());
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            UpstreamError::new(None, format!("Failed to parse OpenAI response JSON: {e}"))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::new(None, "OpenAI returned no reply text"))?;

        info!("OpenAI analysis successful");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OpenAiMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        let role = match msg.role {
            ChatRole::User => "user",
            ChatRole::Model => "assistant",
        };
        Self {
            role,
            content: &msg.text,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}
