//! HTTP entry layer: routes, shared state and the server loop.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use skylink_core::{
    ChatHistory, ChatProvider, Config, ProxyError, WeatherEndpoint, WeatherQuery, WeatherSource,
    chat_provider_from_config, weather_source_from_config,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::ApiError;

pub const MISSING_AI_KEY: &str = "Server is missing the AI provider API key configuration.";
pub const MISSING_WEATHER_KEY: &str = "OpenWeather API Key is missing.";

/// Provider handles shared by every request. Built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub chat: Option<Arc<dyn ChatProvider>>,
    pub weather: Option<Arc<dyn WeatherSource>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chat: chat_provider_from_config(config),
            weather: weather_source_from_config(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/weather/current", get(weather_current))
        .route("/weather/forecast", get(weather_forecast))
        .route("/weather/air-quality", get(weather_air_quality))
        .route("/test", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C / SIGTERM.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "skylink listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("skylink stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = match body {
        Ok(Json(v)) => v,
        // Oversized or unreadable bodies keep their own status.
        Err(rejection @ JsonRejection::BytesRejection(_)) => {
            return Err(ApiError::Rejected(rejection.status(), rejection.body_text()));
        }
        // A body that is not JSON at all has no history either.
        Err(_) => Value::Null,
    };
    let history = ChatHistory::from_request_body(&body)?;

    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| ProxyError::configuration(MISSING_AI_KEY))?;

    let summary = chat.reply(&history).await.map_err(ApiError::analysis)?;
    Ok(Json(json!({ "summary": summary })))
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    lat: Option<String>,
    lon: Option<String>,
}

async fn proxy_weather(
    state: &AppState,
    endpoint: WeatherEndpoint,
    coords: Result<Query<Coordinates>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(coords) = coords.map_err(|rejection| {
        ProxyError::validation(format!("Invalid query string: {}", rejection.body_text()))
    })?;
    let query = WeatherQuery::parse(coords.lat.as_deref(), coords.lon.as_deref())?;

    let weather = state
        .weather
        .as_ref()
        .ok_or_else(|| ProxyError::configuration(MISSING_WEATHER_KEY))?;

    let body = weather.fetch(endpoint, &query).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn weather_current(
    State(state): State<AppState>,
    coords: Result<Query<Coordinates>, QueryRejection>,
) -> Result<Response, ApiError> {
    proxy_weather(&state, WeatherEndpoint::Current, coords).await
}

async fn weather_forecast(
    State(state): State<AppState>,
    coords: Result<Query<Coordinates>, QueryRejection>,
) -> Result<Response, ApiError> {
    proxy_weather(&state, WeatherEndpoint::Forecast, coords).await
}

async fn weather_air_quality(
    State(state): State<AppState>,
    coords: Result<Query<Coordinates>, QueryRejection>,
) -> Result<Response, ApiError> {
    proxy_weather(&state, WeatherEndpoint::AirQuality, coords).await
}

async fn health() -> Json<Value> {
    Json(json!({
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
