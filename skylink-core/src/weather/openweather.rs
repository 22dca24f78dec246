use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    config::ProviderConfig,
    error::{ProxyError, UpstreamError, truncate_body},
    model::{WeatherEndpoint, WeatherQuery},
};

use super::WeatherSource;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn from_config(cfg: &ProviderConfig) -> Self {
        let client = Self::new(cfg.api_key.clone());
        match &cfg.base_url {
            Some(base_url) => client.with_base_url(base_url),
            None => client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, endpoint: WeatherEndpoint) -> String {
        format!("{}/data/2.5/{}", self.base_url, endpoint.upstream_path())
    }
}

/// OpenWeather error bodies look like `{"cod": 401, "message": "Invalid API key..."}`.
#[derive(Debug, Deserialize)]
struct OwError {
    message: Option<String>,
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, endpoint: WeatherEndpoint, query: &WeatherQuery) -> Result<Bytes, ProxyError> {
        let service = endpoint.service_name();
        let lat = query.latitude.to_string();
        let lon = query.longitude.to_string();

        let mut params = vec![
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("appid", self.api_key.as_str()),
        ];
        if endpoint.uses_metric_units() {
            params.push(("units", "metric"));
        }

        let res = self
            .http
            .get(self.url(endpoint))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                error!(service, error = %e, "weather request failed");
                UpstreamError::new(None, format!("Failed to fetch data from {service}."))
            })?;

        let status = res.status();
        let body = res.bytes().await.map_err(|e| {
            error!(service, error = %e, "failed to read weather response body");
            UpstreamError::new(None, format!("Failed to fetch data from {service}."))
        })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            error!(service, %status, body = %truncate_body(&text), "weather upstream returned an error");

            let message = serde_json::from_slice::<OwError>(&body)
                .ok()
                .and_then(|e| e.message)
                .or_else(|| (!text.trim().is_empty()).then(|| truncate_body(&text)))
                .unwrap_or_else(|| format!("Failed to fetch data from {service}."));

            return Err(UpstreamError::new(Some(status.as_u16()), message).into());
        }

        info!(service, bytes = body.len(), "weather data fetched");
        Ok(body)
    }
}
