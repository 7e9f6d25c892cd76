//! `GET /api/weather`: forecast cards for a city picked by name or position.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use dastyar_shared::types::{Language, Theme};
use dastyar_store::{City, ContentQuery};
use serde::Deserialize;
use tracing::debug;

use crate::api::AppState;
use crate::error::ApiError;
use crate::extract::RequestedLocale;
use crate::weather::captions::CaptionContext;
use crate::weather::forecast::{build_days, nearest_city, DayWeather};

#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    city: Option<String>,
    lat: Option<String>,
    lng: Option<String>,
    theme: Option<String>,
}

enum Lookup {
    Name(String),
    Position { lat: f64, lng: f64 },
}

impl WeatherParams {
    fn lookup(&self) -> Result<Lookup, ApiError> {
        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(Lookup::Name(city.to_string()));
        }
        match (self.lat.as_deref(), self.lng.as_deref()) {
            (Some(lat), Some(lng)) => {
                let lat = lat.trim().parse::<f64>().ok().filter(|v| v.is_finite());
                let lng = lng.trim().parse::<f64>().ok().filter(|v| v.is_finite());
                match (lat, lng) {
                    (Some(lat), Some(lng)) => Ok(Lookup::Position { lat, lng }),
                    _ => Err(ApiError::BadRequest("lat and lng must be numbers".into())),
                }
            }
            _ => Err(ApiError::BadRequest("city or lat and lng are required".into())),
        }
    }

    /// `dark` selects the dark palette; anything else is light.
    fn theme(&self) -> Theme {
        match self.theme.as_deref().map(str::parse::<Theme>) {
            Some(Ok(Theme::Dark)) => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

pub async fn weather(
    State(state): State<AppState>,
    RequestedLocale(requested): RequestedLocale,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Vec<DayWeather>>, ApiError> {
    let lookup = params.lookup()?;
    let locale = requested.unwrap_or(Language::Ar);
    let query = ContentQuery::new(locale, state.config.default_locale);

    let city: Option<City> = state
        .db
        .call(move |db| match lookup {
            Lookup::Name(name) => db.find_city_by_name(&query, &name),
            Lookup::Position { lat, lng } => {
                let cities = db.all_cities(&query)?;
                Ok(nearest_city(lat, lng, &cities).cloned())
            }
        })
        .await?;
    let city = city.ok_or_else(|| ApiError::NotFound("City not found".into()))?;
    debug!(city = %city.name, "Weather lookup");

    let (current, forecast) = tokio::try_join!(
        state.weather.current(city.latitude, city.longitude),
        state.weather.forecast(city.latitude, city.longitude),
    )
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let condition = current.conditions.first();
    let context = CaptionContext {
        city: city.name.clone(),
        temp: current.temp,
        condition: condition.map(|c| c.main.clone()).unwrap_or_default(),
        description: condition.map(|c| c.description.clone()).unwrap_or_default(),
        humidity: current.humidity,
        wind_speed: current.wind_speed,
    };
    let caption = state.captions.caption(state.model.as_ref(), &context).await;

    let days = build_days(
        Utc::now().date_naive(),
        &current,
        &forecast,
        params.theme(),
        locale,
        &caption,
    )
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(city: Option<&str>, lat: Option<&str>, lng: Option<&str>) -> WeatherParams {
        WeatherParams {
            city: city.map(Into::into),
            lat: lat.map(Into::into),
            lng: lng.map(Into::into),
            theme: None,
        }
    }

    #[test]
    fn test_lookup_selection() {
        assert!(matches!(params(Some("Tehran"), Some("1"), Some("2")).lookup(), Ok(Lookup::Name(n)) if n == "Tehran"));
        assert!(matches!(
            params(Some("  "), Some("35.7"), Some("51.4")).lookup(),
            Ok(Lookup::Position { .. })
        ));
        assert!(matches!(params(None, Some("35.7"), None).lookup(), Err(ApiError::BadRequest(_))));
        assert!(matches!(params(None, Some("north"), Some("51")).lookup(), Err(ApiError::BadRequest(_))));
        assert!(matches!(params(None, None, None).lookup(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_theme_defaults_to_light() {
        let mut p = params(None, None, None);
        assert_eq!(p.theme(), Theme::Light);
        p.theme = Some("dark".into());
        assert_eq!(p.theme(), Theme::Dark);
        p.theme = Some("neon".into());
        assert_eq!(p.theme(), Theme::Light);
    }
}
