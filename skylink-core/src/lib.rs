//! Core library for the `skylink` proxy.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Generative-AI providers and the rate-limit fallback between them
//! - The pass-through weather source
//! - Shared domain models and the error taxonomy
//!
//! It is used by `skylink-server`, but the providers can be driven from any host.

pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod weather;

pub use chat::{ChatProvider, FallbackChat, GeminiChat, OpenAiChat};
pub use config::{Config, ProviderConfig};
pub use error::{ProxyError, UpstreamError};
pub use model::{ChatHistory, ChatMessage, ChatRole, WeatherEndpoint, WeatherQuery};
pub use provider::{ProviderId, chat_provider_from_config, weather_source_from_config};
pub use weather::{OpenWeatherClient, WeatherSource};
