use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::Password;
use skylink_core::{Config, ProviderId};
use tracing::{info, warn};

use crate::app::{self, AppState};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skylink", version, about = "AI analysis and weather proxy server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to bind, e.g. "127.0.0.1:3001". Overrides config and SKYLINK_BIND.
        #[arg(long)]
        bind: Option<String>,

        /// Start even when no OpenWeather key is configured; weather routes then answer 500.
        #[arg(long)]
        allow_missing_weather_key: bool,
    },

    /// Store the API key for a provider in the config file.
    Configure {
        /// Provider short name: "gemini", "openai" or "openweather".
        provider: String,
    },

    /// Show which providers have credentials.
    Check,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve {
                bind,
                allow_missing_weather_key,
            } => {
                let config = Config::load_with_env()?;
                log_credentials(&config);

                check_startup(&config, allow_missing_weather_key)?;

                let state = AppState::from_config(&config);
                if state.chat.is_none() {
                    warn!("no AI provider key configured; /analyze will answer 500");
                }

                let addr = bind.unwrap_or_else(|| config.bind_address().to_string());
                app::serve(state, &addr).await?;
            }
            Command::Configure { provider } => {
                let id = ProviderId::try_from(provider.as_str())?;

                let api_key = Password::new(&format!("{} API key:", id.display_name()))
                    .without_confirmation()
                    .prompt()
                    .context("Failed to read API key")?;

                if api_key.trim().is_empty() {
                    bail!("API key must not be empty");
                }

                // File contents only: environment keys must not end up on disk.
                let mut config = Config::load()?;
                config.upsert_provider_api_key(id, api_key.trim().to_string());
                config.save()?;

                println!(
                    "Saved {} key to {}",
                    id.display_name(),
                    Config::config_file_path()?.display()
                );
            }
            Command::Check => {
                let config = Config::load_with_env()?;
                for id in ProviderId::all() {
                    let status = config
                        .provider_api_key(*id)
                        .map(|key| format!("yes, starts with {}", mask_key(key)))
                        .unwrap_or_else(|| "no".to_string());
                    println!("{:<12} {}", id.as_str(), status);
                }
            }
        }

        Ok(())
    }
}

/// The standalone server refuses to start without its weather credential.
fn check_startup(config: &Config, allow_missing_weather_key: bool) -> anyhow::Result<()> {
    if !config.is_provider_configured(ProviderId::OpenWeather) && !allow_missing_weather_key {
        bail!(
            "{} is not configured.\n\
             Hint: export it, or run `skylink configure openweather`.",
            ProviderId::OpenWeather.api_key_env()
        );
    }
    Ok(())
}

fn log_credentials(config: &Config) {
    for id in ProviderId::all() {
        match config.provider_api_key(*id) {
            Some(key) => info!(provider = %id, key_prefix = %mask_key(key), "API key loaded"),
            None => info!(provider = %id, "API key not configured"),
        }
    }
}

/// First four characters of a key, for diagnostics.
fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}
