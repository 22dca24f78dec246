use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProxyError;

/// Speaker of a chat turn. `assistant` is accepted as an alias for `model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "assistant")]
    Model,
}

/// One turn of a conversation.
///
/// On the wire either `{ "role", "text" }` or the Gemini-shaped
/// `{ "role", "parts": [{ "text" }] }` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChatMessage")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawPart {
    text: String,
}

#[derive(Deserialize)]
struct RawChatMessage {
    role: ChatRole,
    text: Option<String>,
    parts: Option<Vec<RawPart>>,
}

impl TryFrom<RawChatMessage> for ChatMessage {
    type Error = String;

    fn try_from(raw: RawChatMessage) -> Result<Self, Self::Error> {
        let text = match (raw.text, raw.parts) {
            (Some(text), _) => text,
            (None, Some(parts)) => parts
                .into_iter()
                .next()
                .map(|p| p.text)
                .ok_or_else(|| "message `parts` must not be empty".to_string())?,
            (None, None) => return Err("message needs a `text` or `parts` field".to_string()),
        };

        Ok(Self { role: raw.role, text })
    }
}

/// Ordered conversation, oldest first. The last message is the current turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHistory {
    context: Vec<ChatMessage>,
    turn: ChatMessage,
}

impl ChatHistory {
    pub fn new(mut messages: Vec<ChatMessage>) -> Result<Self, ProxyError> {
        let turn = messages
            .pop()
            .ok_or_else(|| ProxyError::validation("The \"history\" array must not be empty."))?;
        Ok(Self {
            context: messages,
            turn,
        })
    }

    /// Extract the `history` field of an `/analyze` request body.
    pub fn from_request_body(body: &Value) -> Result<Self, ProxyError> {
        let items = body
            .get("history")
            .and_then(Value::as_array)
            .ok_or_else(|| ProxyError::validation("A \"history\" array is required."))?;

        let messages = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                ChatMessage::deserialize(item).map_err(|e| {
                    ProxyError::validation(format!("Invalid message at history[{i}]: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(messages)
    }

    /// All messages, oldest first, current turn last.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.context.iter().chain(std::iter::once(&self.turn))
    }

    /// Everything before the current turn.
    pub fn context(&self) -> &[ChatMessage] {
        &self.context
    }

    pub fn turn(&self) -> &ChatMessage {
        &self.turn
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
}

impl WeatherQuery {
    /// Build from raw query-string values. Both must be present and numeric.
    pub fn parse(lat: Option<&str>, lon: Option<&str>) -> Result<Self, ProxyError> {
        let (lat, lon) = match (lat.map(str::trim), lon.map(str::trim)) {
            (Some(lat), Some(lon)) if !lat.is_empty() && !lon.is_empty() => (lat, lon),
            _ => return Err(ProxyError::validation("Latitude and longitude are required.")),
        };

        let invalid = || ProxyError::validation("Latitude and longitude must be numbers.");
        let latitude: f64 = lat.parse().map_err(|_| invalid())?;
        let longitude: f64 = lon.parse().map_err(|_| invalid())?;
        // f64 parsing accepts "NaN" and "inf".
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(invalid());
        }

        Ok(Self { latitude, longitude })
    }
}

/// The three proxied weather operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherEndpoint {
    Current,
    Forecast,
    AirQuality,
}

impl WeatherEndpoint {
    /// Path segment under `/data/2.5/` on the upstream API.
    pub fn upstream_path(&self) -> &'static str {
        match self {
            WeatherEndpoint::Current => "weather",
            WeatherEndpoint::Forecast => "forecast",
            WeatherEndpoint::AirQuality => "air_pollution",
        }
    }

    pub fn uses_metric_units(&self) -> bool {
        !matches!(self, WeatherEndpoint::AirQuality)
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            WeatherEndpoint::Current => "OpenWeather Current",
            WeatherEndpoint::Forecast => "OpenWeather Forecast",
            WeatherEndpoint::AirQuality => "OpenWeather Air Quality",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_text_and_parts_shapes() {
        let body = json!({
            "history": [
                { "role": "user", "text": "hi" },
                { "role": "model", "parts": [{ "text": "hello" }] },
                { "role": "assistant", "text": "again" },
            ]
        });

        let history = ChatHistory::from_request_body(&body).expect("valid history");
        let messages: Vec<_> = history.iter().cloned().collect();
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::model("hello"),
                ChatMessage::model("again"),
            ]
        );
    }

    #[test]
    fn missing_or_non_array_history_is_rejected() {
        for body in [json!({}), json!({ "history": "hi" }), json!({ "history": { "role": "user" } })] {
            let err = ChatHistory::from_request_body(&body).unwrap_err();
            assert_eq!(err, ProxyError::validation("A \"history\" array is required."));
        }
    }

    #[test]
    fn empty_history_is_rejected() {
        let err = ChatHistory::from_request_body(&json!({ "history": [] })).unwrap_err();
        assert!(matches!(err, ProxyError::Validation(_)));
    }

    #[test]
    fn bad_element_reports_index() {
        let body = json!({ "history": [{ "role": "user", "text": "ok" }, { "role": "robot", "text": "x" }] });
        let err = ChatHistory::from_request_body(&body).unwrap_err();
        assert!(err.to_string().contains("history[1]"));
    }

    #[test]
    fn last_message_is_the_current_turn() {
        let history = ChatHistory::new(vec![
            ChatMessage::user("a"),
            ChatMessage::model("b"),
            ChatMessage::user("c"),
        ])
        .unwrap();

        assert_eq!(history.iter().count(), 3);
        assert_eq!(history.context().len(), 2);
        assert_eq!(history.turn(), &ChatMessage::user("c"));
    }

    #[test]
    fn weather_query_requires_both_coordinates() {
        assert!(WeatherQuery::parse(Some("1"), None).is_err());
        assert!(WeatherQuery::parse(None, Some("1")).is_err());
        assert!(WeatherQuery::parse(Some(""), Some("1")).is_err());

        let q = WeatherQuery::parse(Some("51.5"), Some("-0.12")).unwrap();
        assert_eq!(q, WeatherQuery { latitude: 51.5, longitude: -0.12 });
    }

    #[test]
    fn weather_query_rejects_non_numeric() {
        let err = WeatherQuery::parse(Some("north"), Some("1")).unwrap_err();
        assert_eq!(err, ProxyError::validation("Latitude and longitude must be numbers."));
    }

    #[test]
    fn weather_query_rejects_non_finite() {
        let expected = ProxyError::validation("Latitude and longitude must be numbers.");

        assert_eq!(WeatherQuery::parse(Some("NaN"), Some("1")).unwrap_err(), expected);
        assert_eq!(WeatherQuery::parse(Some("1"), Some("inf")).unwrap_err(), expected);
        assert_eq!(WeatherQuery::parse(Some("-infinity"), Some("2")).unwrap_err(), expected);
    }
}
