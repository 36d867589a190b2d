//! Ambient conditions consumed by the flow advisor.

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature_c: f64,
    pub description: String,
    pub humidity: u8,
    pub simulated: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WeatherError {
    #[error("weather provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str, now: DateTime<Utc>) -> Result<WeatherReport, WeatherError>;
}

/// Plausible weather derived from the hour of day. Used when no live provider is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeOfDayWeather;

impl TimeOfDayWeather {
    pub fn new() -> Self {
        Self
    }

    pub fn report_for_hour(&self, city: &str, hour: u32) -> WeatherReport {
        let (temperature_c, description, humidity) = match hour {
            6..=11 => (14.0, "fresco y soleado, buen día para un café", 65),
            12..=17 => (22.0, "agradable y soleado", 50),
            18..=21 => (17.0, "fresquito, perfecto para una caña", 60),
            _ => (12.0, "frío, ideal para algo calentito", 70),
        };

        WeatherReport {
            city: city.to_string(),
            temperature_c,
            description: description.to_string(),
            humidity,
            simulated: true,
        }
    }
}

#[async_trait]
impl WeatherProvider for TimeOfDayWeather {
    async fn current(&self, city: &str, now: DateTime<Utc>) -> Result<WeatherReport, WeatherError> {
        Ok(self.report_for_hour(city, now.hour()))
    }
}

/// Always reports the same temperature.
#[derive(Clone, Debug)]
pub struct FixedWeather {
    pub temperature_c: f64,
    pub description: String,
}

impl FixedWeather {
    pub fn new(temperature_c: f64) -> Self {
        Self { temperature_c, description: "fixed".to_string() }
    }
}

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self, city: &str, _now: DateTime<Utc>) -> Result<WeatherReport, WeatherError> {
        Ok(WeatherReport {
            city: city.to_string(),
            temperature_c: self.temperature_c,
            description: self.description.clone(),
            humidity: 50,
            simulated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{FixedWeather, TimeOfDayWeather, WeatherProvider};

    #[test]
    fn time_of_day_buckets() {
        let weather = TimeOfDayWeather::new();

        assert_eq!(weather.report_for_hour("Madrid", 9).temperature_c, 14.0);
        assert_eq!(weather.report_for_hour("Madrid", 12).temperature_c, 22.0);
        assert_eq!(weather.report_for_hour("Madrid", 21).humidity, 60);
        assert_eq!(weather.report_for_hour("Madrid", 3).temperature_c, 12.0);
        assert!(weather.report_for_hour("Madrid", 23).description.contains("calentito"));
    }

    #[tokio::test]
    async fn providers_report_requested_city() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 14, 0, 0).single().expect("valid timestamp");

        let live = TimeOfDayWeather::new().current("Sevilla", now).await.expect("weather");
        assert_eq!(live.city, "Sevilla");
        assert_eq!(live.temperature_c, 22.0);

        let fixed = FixedWeather::new(35.0).current("Sevilla", now).await.expect("weather");
        assert_eq!(fixed.temperature_c, 35.0);
    }
}
