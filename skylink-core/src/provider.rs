use crate::{
    Config,
    chat::{ChatProvider, FallbackChat, GeminiChat, OpenAiChat},
    weather::{OpenWeatherClient, WeatherSource},
};
use std::{convert::TryFrom, sync::Arc};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Gemini,
    OpenAi,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::OpenWeather => "openweather",
        }
    }

    /// Environment variable carrying this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "GEMINI_API_KEY",
            ProviderId::OpenAi => "OPENAI_API_KEY",
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
        }
    }

    /// Human-readable name used in log lines and error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Gemini",
            ProviderId::OpenAi => "OpenAI",
            ProviderId::OpenWeather => "OpenWeather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Gemini, ProviderId::OpenAi, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            "openai" => Ok(ProviderId::OpenAi),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: gemini, openai, openweather."
            )),
        }
    }
}

/// Build the AI chain from whatever keys are configured.
///
/// Gemini is primary with OpenAI as its rate-limit fallback. With only an
/// OpenAI key, OpenAI serves alone. With neither, `None`.
pub fn chat_provider_from_config(config: &Config) -> Option<Arc<dyn ChatProvider>> {
    let openai = config
        .provider_config(ProviderId::OpenAi)
        .map(|cfg| Arc::new(OpenAiChat::from_config(cfg)) as Arc<dyn ChatProvider>);

    match config.provider_config(ProviderId::Gemini) {
        Some(cfg) => {
            let primary: Arc<dyn ChatProvider> = Arc::new(GeminiChat::from_config(cfg));
            info!(fallback = openai.is_some(), "AI provider chain: gemini primary");
            Some(Arc::new(FallbackChat::new(primary, openai)))
        }
        None => {
            if openai.is_some() {
                info!("AI provider chain: openai only");
            }
            openai
        }
    }
}

/// Build the weather source if its key is configured.
pub fn weather_source_from_config(config: &Config) -> Option<Arc<dyn WeatherSource>> {
    config
        .provider_config(ProviderId::OpenWeather)
        .map(|cfg| Arc::new(OpenWeatherClient::from_config(cfg)) as Arc<dyn WeatherSource>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn no_keys_means_no_chat_provider() {
        let cfg = Config::default();
        assert!(chat_provider_from_config(&cfg).is_none());
        assert!(weather_source_from_config(&cfg).is_none());
    }

    #[test]
    fn gemini_key_builds_fallback_chain() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Gemini, "G".into());

        let chat = chat_provider_from_config(&cfg).expect("chain");
        assert_eq!(chat.id(), ProviderId::Gemini);
    }

    #[test]
    fn openai_alone_serves_directly() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenAi, "O".into());

        let chat = chat_provider_from_config(&cfg).expect("openai");
        assert_eq!(chat.id(), ProviderId::OpenAi);
    }

    #[test]
    fn weather_source_needs_openweather_key() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "W".into());
        assert!(weather_source_from_config(&cfg).is_some());
    }
}
