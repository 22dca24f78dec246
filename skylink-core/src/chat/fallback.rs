use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

use crate::{error::ProxyError, model::ChatHistory, provider::ProviderId};

use super::ChatProvider;

pub const FALLBACK_UNAVAILABLE: &str =
    "Primary AI provider is rate limited and no fallback provider is configured.";

/// Primary provider with an optional secondary used only on rate-limit failures.
#[derive(Debug, Clone)]
pub struct FallbackChat {
    primary: Arc<dyn ChatProvider>,
    secondary: Option<Arc<dyn ChatProvider>>,
}

impl FallbackChat {
    pub fn new(primary: Arc<dyn ChatProvider>, secondary: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ChatProvider for FallbackChat {
    fn id(&self) -> ProviderId {
        self.primary.id()
    }

    async fn reply(&self, history: &ChatHistory) -> Result<String, ProxyError> {
        let err = match self.primary.reply(history).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_rate_limited() => err,
            Err(err) => return Err(err),
        };

        let Some(secondary) = &self.secondary else {
            error!(primary = %self.primary.id(), error = %err, "rate limited with no fallback configured");
            return Err(ProxyError::configuration(FALLBACK_UNAVAILABLE));
        };

        warn!(
            primary = %self.primary.id(),
            secondary = %secondary.id(),
            error = %err,
            "primary AI provider rate limited, falling back"
        );
        secondary.reply(history).await
    }
}
