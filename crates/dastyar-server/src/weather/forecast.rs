//! Turns raw provider samples into the per-day cards the client renders.

use chrono::{Datelike, NaiveDate};
use dastyar_shared::constants::EARTH_RADIUS_KM;
use dastyar_shared::types::{Language, Theme};
use dastyar_store::City;
use serde::Serialize;

use super::captions::Caption;
use super::{Condition, CurrentWeather, ForecastSample, WeatherError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDescription {
    pub text: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWeather {
    /// `YYYY-MM-DD`
    pub date: String,
    pub date_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub weather: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_description: Option<CustomDescription>,
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Closest city to the point; the first one wins on equal distance.
pub fn nearest_city(lat: f64, lon: f64, cities: &[City]) -> Option<&City> {
    let mut best: Option<(&City, f64)> = None;
    for city in cities {
        let distance = haversine_km(lat, lon, city.latitude, city.longitude);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((city, distance));
        }
    }
    best.map(|(city, _)| city)
}

/// Card background for a condition code.
pub fn background_color(condition_id: u32, theme: Theme) -> &'static str {
    let (light, dark) = match condition_id {
        200..=299 => ("#4A5568", "#2D3748"),
        300..=399 | 500..=599 => ("#63B3ED", "#2B6CB0"),
        600..=699 => ("#E2E8F0", "#4A5568"),
        700..=799 => ("#A0AEC0", "#4A5568"),
        800 => ("#87CEEB", "#1A365D"),
        801.. => ("#CBD5E0", "#2D3748"),
        _ => ("#87CEEB", "#1A365D"),
    };
    if theme == Theme::Dark {
        dark
    } else {
        light
    }
}

pub fn text_color(theme: Theme) -> &'static str {
    if theme == Theme::Dark {
        "#F7FAFC"
    } else {
        "#1A202C"
    }
}

const WEEKDAYS_EN: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];
const WEEKDAYS_AR: [&str; 7] = ["الأحد", "الاثنين", "الثلاثاء", "الأربعاء", "الخميس", "الجمعة", "السبت"];
const WEEKDAYS_FA: [&str; 7] = ["یکشنبه", "دوشنبه", "سه‌شنبه", "چهارشنبه", "پنجشنبه", "جمعه", "شنبه"];

/// "Today", "Tomorrow" or the weekday name, in `locale`.
pub fn day_title(date: NaiveDate, today: NaiveDate, locale: Language) -> &'static str {
    let (today_title, tomorrow_title, weekdays) = match locale {
        Language::En => ("Today", "Tomorrow", &WEEKDAYS_EN),
        Language::Ar => ("اليوم", "غداً", &WEEKDAYS_AR),
        Language::Fa => ("امروز", "فردا", &WEEKDAYS_FA),
    };

    match (date - today).num_days() {
        0 => today_title,
        1 => tomorrow_title,
        _ => weekdays[date.weekday().num_days_from_sunday() as usize],
    }
}

/// Build the day list: today from the current conditions and the first
/// sample, then one entry per later calendar day of the forecast.
pub fn build_days(
    today: NaiveDate,
    current: &CurrentWeather,
    samples: &[ForecastSample],
    theme: Theme,
    locale: Language,
    caption: &Caption,
) -> Result<Vec<DayWeather>, WeatherError> {
    let first = samples
        .first()
        .ok_or_else(|| WeatherError::Malformed("empty forecast".into()))?;

    let condition = current.conditions.first().or(first.conditions.first());
    let condition_id = condition.map(|c| c.id).unwrap_or_default();
    let min = first.temp_min;
    let max = if first.temp_max > min { first.temp_max } else { min + 1.0 };

    let mut days = vec![DayWeather {
        date: today.format("%Y-%m-%d").to_string(),
        date_title: day_title(today, today, locale).to_string(),
        current: Some(current.temp),
        min,
        max,
        weather: condition.cloned(),
        background_color: Some(background_color(condition_id, theme).to_string()),
        text_color: Some(text_color(theme).to_string()),
        custom_description: Some(CustomDescription {
            text: caption.text(locale).to_string(),
            emoji: caption.emoji.clone(),
        }),
    }];

    for day in group_by_day(samples) {
        if day.date <= today {
            continue;
        }
        days.push(DayWeather {
            date: day.date.format("%Y-%m-%d").to_string(),
            date_title: day_title(day.date, today, locale).to_string(),
            current: None,
            min: day.min,
            max: day.max,
            weather: day.majority_condition(),
            background_color: None,
            text_color: None,
            custom_description: None,
        });
    }

    Ok(days)
}

struct DayAggregate<'a> {
    date: NaiveDate,
    min: f64,
    max: f64,
    /// `(main, votes, first condition seen with that main)`, first-seen order.
    votes: Vec<(&'a str, usize, &'a Condition)>,
}

impl DayAggregate<'_> {
    fn majority_condition(&self) -> Option<Condition> {
        let mut best: Option<&(&str, usize, &Condition)> = None;
        for entry in &self.votes {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(_, _, condition)| (*condition).clone())
    }
}

fn group_by_day(samples: &[ForecastSample]) -> Vec<DayAggregate<'_>> {
    let mut days: Vec<DayAggregate<'_>> = Vec::new();

    for sample in samples {
        let Some(date) = sample
            .dt_txt
            .split(' ')
            .next()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };

        let day = match days.iter().position(|d| d.date == date) {
            Some(index) => &mut days[index],
            None => {
                days.push(DayAggregate {
                    date,
                    min: sample.temp_min,
                    max: sample.temp_max,
                    votes: Vec::new(),
                });
                let last = days.len() - 1;
                &mut days[last]
            }
        };

        day.min = day.min.min(sample.temp_min);
        day.max = day.max.max(sample.temp_max);
        if let Some(condition) = sample.conditions.first() {
            match day.votes.iter_mut().find(|(main, _, _)| *main == condition.main) {
                Some(entry) => entry.1 += 1,
                None => day.votes.push((&condition.main, 1, condition)),
            }
        }
    }

    days
}
