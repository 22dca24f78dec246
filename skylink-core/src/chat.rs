//! Generative-AI providers that turn a chat history into a reply.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::{ProxyError, UpstreamError, truncate_body},
    model::ChatHistory,
    provider::ProviderId,
};

pub mod fallback;
pub mod gemini;
pub mod openai;

pub use fallback::FallbackChat;
pub use gemini::{ChatSession, GeminiChat};
pub use openai::OpenAiChat;

#[async_trait]
pub trait ChatProvider: Send + Sync + Debug {
    /// Provider that answers first when this handle is asked.
    fn id(&self) -> ProviderId;

    /// Produce the reply text for the last message of `history`.
    async fn reply(&self, history: &ChatHistory) -> Result<String, ProxyError>;
}

/// Map a non-2xx provider response to an [`UpstreamError`].
///
/// Both Gemini and OpenAI wrap failures as `{ "error": { "message", ... } }`;
/// Gemini puts the machine-readable reason in `status`, OpenAI in `code` or `type`.
pub(crate) fn upstream_error(provider: ProviderId, status: u16, body: &str) -> UpstreamError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let detail = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_body(body));

    let code = error.and_then(|e| {
        ["status", "code", "type"]
            .iter()
            .find_map(|field| e.get(*field).and_then(Value::as_str))
    });

    let err = UpstreamError::new(
        Some(status),
        format!(
            "{} request failed with status {status}: {detail}",
            provider.display_name()
        ),
    );

    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

pub(crate) fn transport_error(provider: ProviderId, err: reqwest::Error) -> UpstreamError {
    UpstreamError::new(
        err.status().map(|s| s.as_u16()),
        format!("Failed to send request to {}: {err}", provider.display_name()),
    )
}
