use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::provider::ProviderId;

/// Address the standalone server binds to when nothing else is configured.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SKYLINK_CONFIG";

/// Environment variable that overrides `bind_address`.
pub const BIND_ENV: &str = "SKYLINK_BIND";

/// Configuration for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,

    /// Overrides the provider's public API root, e.g. for a proxy or a mock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Overrides the default model for AI providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Top-level configuration stored on disk and overlaid by the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Example TOML:
    /// [providers.gemini]
    /// api_key = "..."
    /// model = "gemini-1.5-flash"
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Load the config file and apply environment overrides on top.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let dirs = ProjectDirs::from("dev", "skylink", "skylink")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the environment. Non-empty variables win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind) = non_empty(BIND_ENV) {
            self.bind_address = Some(bind);
        }

        for id in ProviderId::all() {
            if let Some(key) = non_empty(id.api_key_env()) {
                self.providers.entry(id.as_str().to_string()).or_default().api_key = key;
            }
        }
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    /// Set/replace a provider API key, keeping any other settings for it.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.entry(provider_id.as_str().to_string()).or_default().api_key = api_key;
    }

    /// Settings for a provider, only if it has a usable API key.
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers
            .get(id.as_str())
            .filter(|cfg| !cfg.api_key.trim().is_empty())
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_config_has_no_providers() {
        let cfg = Config::default();

        assert_eq!(cfg.bind_address(), DEFAULT_BIND_ADDRESS);
        for id in ProviderId::all() {
            assert!(!cfg.is_provider_configured(*id));
        }
    }

    #[test]
    fn env_keys_fill_providers() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("GEMINI_API_KEY", "G_KEY"),
            ("OPENWEATHER_API_KEY", "W_KEY"),
            ("SKYLINK_BIND", "127.0.0.1:9000"),
        ]));

        assert_eq!(cfg.provider_api_key(ProviderId::Gemini), Some("G_KEY"));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("W_KEY"));
        assert!(!cfg.is_provider_configured(ProviderId::OpenAi));
        assert_eq!(cfg.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn env_overrides_file_key_but_keeps_other_settings() {
        let mut cfg = Config::from_toml(
            r#"
            [providers.openai]
            api_key = "FILE_KEY"
            model = "gpt-4o"
            "#,
        )
        .expect("valid toml");

        cfg.apply_env(env(&[("OPENAI_API_KEY", "ENV_KEY")]));

        let openai = cfg.provider_config(ProviderId::OpenAi).expect("configured");
        assert_eq!(openai.api_key, "ENV_KEY");
        assert_eq!(openai.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[("OPENWEATHER_API_KEY", "  ")]));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, String::new());
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_replaces_key_only() {
        let mut cfg = Config::from_toml(
            r#"
            bind_address = "127.0.0.1:4000"

            [providers.gemini]
            api_key = "OLD"
            base_url = "http://localhost:9999"
            "#,
        )
        .expect("valid toml");

        cfg.upsert_provider_api_key(ProviderId::Gemini, "NEW".into());

        let gemini = cfg.provider_config(ProviderId::Gemini).expect("configured");
        assert_eq!(gemini.api_key, "NEW");
        assert_eq!(gemini.base_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(cfg.bind_address(), "127.0.0.1:4000");
    }

    #[test]
    fn toml_roundtrip_keeps_providers() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "W".into());

        let text = toml::to_string_pretty(&cfg).expect("serializes");
        let back = Config::from_toml(&text).expect("parses");

        assert_eq!(back.provider_api_key(ProviderId::OpenWeather), Some("W"));
    }
}
