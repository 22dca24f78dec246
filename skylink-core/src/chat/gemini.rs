use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::ProviderConfig,
    error::{ProxyError, UpstreamError},
    model::{ChatHistory, ChatMessage, ChatRole},
    provider::ProviderId,
};

use super::{ChatProvider, transport_error, upstream_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiChat {
    api_key: String,
    base_url: String,
    model: String,
    http: Client,
}

impl GeminiChat {
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

    /// Open a chat session seeded with prior turns.
    pub fn start_chat(&self, context: &[ChatMessage]) -> ChatSession<'_> {
        ChatSession {
            client: self,
            contents: context.iter().map(GeminiContent::from).collect(),
        }
    }

    async fn generate(&self, contents: &[GeminiContent]) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let res = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest { contents })
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::Gemini, e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| transport_error(ProviderId::Gemini, e))?;

        if !status.is_success() {
            return Err(upstream_error(ProviderId::Gemini, status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            UpstreamError::new(None, format!("Failed to parse Gemini response JSON: {e}"))
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| UpstreamError::new(None, "Gemini returned no reply text"))
    }
}

/// Stateful conversation with Gemini. Each sent turn and its reply are
/// appended to the session.
#[derive(Debug)]
pub struct ChatSession<'a> {
    client: &'a GeminiChat,
    contents: Vec<GeminiContent>,
}

impl ChatSession<'_> {
    pub async fn send_message(&mut self, message: &ChatMessage) -> Result<String, ProxyError> {
        self.contents.push(GeminiContent::from(message));

        match self.client.generate(&self.contents).await {
            Ok(reply) => {
                self.contents.push(GeminiContent::from(&ChatMessage::model(reply.clone())));
                Ok(reply)
            }
            Err(e) => {
                // A failed turn is not part of the conversation.
                self.contents.pop();
                Err(e.into())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

#[async_trait]
impl ChatProvider for GeminiChat {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn reply(&self, history: &ChatHistory) -> Result<String, ProxyError> {
        info!(model = %self.model, turns = history.context().len() + 1, "attempting AI analysis with Gemini");

        let mut session = self.start_chat(history.context());
        let reply = session.send_message(history.turn()).await?;

        debug!(session_len = session.len(), "Gemini analysis successful");
        Ok(reply)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl From<&ChatMessage> for GeminiContent {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(msg.text.clone()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [GeminiContent],
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn client(server: &MockServer) -> GeminiChat {
        GeminiChat::new("test-key".into()).with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn sends_context_then_current_turn() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [{ "text": "how hot is it?" }] },
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("warm")))
            .expect(1)
            .mount(&server)
            .await;

        let history = ChatHistory::new(vec![
            ChatMessage::user("hi"),
            ChatMessage::model("hello"),
            ChatMessage::user("how hot is it?"),
        ])
        .unwrap();

        let reply = client(&server).reply(&history).await.unwrap();
        assert_eq!(reply, "warm");
    }

    #[tokio::test]
    async fn session_keeps_replies_and_drops_failed_turns() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ok")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let gemini = client(&server);
        let mut session = gemini.start_chat(&[]);

        session.send_message(&ChatMessage::user("one")).await.unwrap();
        assert_eq!(session.len(), 2);

        session.send_message(&ChatMessage::user("two")).await.unwrap_err();
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_maps_to_upstream_429() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let history = ChatHistory::new(vec![ChatMessage::user("hi")]).unwrap();
        let err = client(&server).reply(&history).await.unwrap_err();

        assert!(err.is_rate_limited());
        match err {
            ProxyError::Upstream(e) => assert_eq!(e.status, Some(429)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_candidates_is_an_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let history = ChatHistory::new(vec![ChatMessage::user("hi")]).unwrap();
        let err = client(&server).reply(&history).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream(_)));
    }
}
