//! Weather lookup: provider client, forecast aggregation and captions.

pub mod captions;
pub mod forecast;
pub mod openweathermap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather provider is not configured")]
    NotConfigured,

    #[error("weather request failed: {0}")]
    Transport(String),

    #[error("weather provider answered {0}")]
    Status(u16),

    #[error("malformed weather response: {0}")]
    Malformed(String),
}

/// One provider weather condition (`id` follows the OpenWeatherMap code
/// table: 2xx thunderstorm, 3xx drizzle, 5xx rain, 6xx snow, 7xx
/// atmosphere, 800 clear, 80x clouds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub conditions: Vec<Condition>,
}

/// One 3-hourly forecast sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    pub dt: i64,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub dt_txt: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub conditions: Vec<Condition>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError>;

    /// Five days of 3-hourly samples, oldest first.
    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastSample>, WeatherError>;
}
