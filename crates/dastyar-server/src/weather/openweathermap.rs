//! OpenWeatherMap REST client (metric units).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Condition, CurrentWeather, ForecastSample, WeatherError, WeatherProvider};
use crate::config::ServerConfig;

pub struct OpenWeatherMap {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMap {
    pub fn new(config: &ServerConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.openweathermap_base_url.clone(),
            api_key: config.openweathermap_api_key.clone(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, lat: f64, lon: f64) -> Result<T, WeatherError> {
        if self.api_key.is_empty() {
            return Err(WeatherError::NotConfigured);
        }

        let response = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        let body: CurrentBody = self.get("weather", lat, lon).await?;
        Ok(CurrentWeather {
            temp: body.main.temp,
            humidity: body.main.humidity,
            wind_speed: body.wind.speed,
            conditions: body.weather,
        })
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastSample>, WeatherError> {
        let body: ForecastBody = self.get("forecast", lat, lon).await?;
        Ok(body
            .list
            .into_iter()
            .map(|item| ForecastSample {
                dt: item.dt,
                dt_txt: item.dt_txt,
                temp_min: item.main.temp_min,
                temp_max: item.main.temp_max,
                conditions: item.weather,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct MainBody {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WindBody {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentBody {
    #[serde(default)]
    weather: Vec<Condition>,
    main: MainBody,
    #[serde(default)]
    wind: WindBody,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    dt_txt: String,
    main: MainBody,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct ForecastBody {
    list: Vec<ForecastItem>,
}
