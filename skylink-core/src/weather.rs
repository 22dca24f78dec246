//! Pass-through access to the upstream weather service.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::{
    error::ProxyError,
    model::{WeatherEndpoint, WeatherQuery},
};

pub mod openweather;

pub use openweather::OpenWeatherClient;

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Fetch the raw JSON document for `endpoint`, unmodified.
    async fn fetch(&self, endpoint: WeatherEndpoint, query: &WeatherQuery) -> Result<Bytes, ProxyError>;
}
