//! Weather forecast tool backed by the Open-Meteo API (no key needed).
//!
//! A call resolves the place name with the geocoding endpoint, then fetches
//! a daily forecast for the first match.  Upstream problems (unknown place,
//! bad status, unreachable service) are reported to the model as text so it
//! can adjust its plan; only a malformed call is an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::llm::types::ToolDefinition;
use crate::tools::Tool;

// ═══════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════

/// Name advertised to the model.
pub const WEATHER_TOOL_NAME: &str = "query_weather";

/// Open-Meteo geocoding endpoint.
const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Open-Meteo forecast endpoint.
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Daily variables requested from the forecast endpoint.
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";

/// Longest forecast a call may ask for.
const MAX_DAYS: u64 = 7;

// ═══════════════════════════════════════════════════════════════════════
//  Wire types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
}

impl Place {
    fn label(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {country}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: DailyForecast,
}

/// Daily forecast columns, one entry per day.
#[derive(Debug, Default, Deserialize)]
pub struct DailyForecast {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub weather_code: Vec<Option<u8>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
}

// ═══════════════════════════════════════════════════════════════════════
//  Tool
// ═══════════════════════════════════════════════════════════════════════

/// Looks up the daily forecast for a place.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherTool {
    /// Create a tool talking to the public Open-Meteo endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ConfigError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentError::ConfigError {
                reason: format!("failed to build weather HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            geocoding_url: GEOCODING_URL.into(),
            forecast_url: FORECAST_URL.into(),
        })
    }

    /// Point the tool at other endpoints speaking the Open-Meteo protocol.
    pub fn with_endpoints(
        mut self,
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
    ) -> Self {
        self.geocoding_url = geocoding_url.into();
        self.forecast_url = forecast_url.into();
        self
    }

    async fn locate(&self, location: &str) -> std::result::Result<Option<Place>, String> {
        let response = self
            .client
            .get(&self.geocoding_url)
            .query(&[("name", location), ("count", "1"), ("format", "json")])
            .send()
            .await
            .map_err(|e| format!("geocoding request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("geocoding returned status {}", response.status()));
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse geocoding response: {e}"))?;
        Ok(body.results.into_iter().next())
    }

    async fn forecast(&self, place: &Place, days: u64) -> std::result::Result<DailyForecast, String> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("daily", DAILY_FIELDS.to_owned()),
                ("timezone", "auto".to_owned()),
                ("forecast_days", days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("forecast request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("forecast returned status {}", response.status()));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse forecast response: {e}"))?;
        Ok(body.daily)
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WEATHER_TOOL_NAME.into(),
            description: "Query the daily weather forecast for a place, to help plan \
                          outdoor activities and packing."
                .into(),
            input_schema: json!({
                "type": "object",
                "required": ["location"],
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City or place name, e.g. Kyoto or Paris"
                    },
                    "days": {
                        "type": "integer",
                        "description": "Number of days to forecast (1-7, default 1)",
                        "minimum": 1,
                        "maximum": MAX_DAYS
                    }
                }
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let location = arguments
            .get("location")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AgentError::ToolExecutionFailed {
                tool_name: WEATHER_TOOL_NAME.into(),
                reason: "missing required string field `location`".into(),
            })?;
        let days = requested_days(&arguments);

        debug!(location, days, "querying weather");

        let place = match self.locate(location).await {
            Ok(Some(place)) => place,
            Ok(None) => return Ok(format!("Weather query failed: location not found: {location}")),
            Err(reason) => {
                warn!(location, %reason, "weather lookup failed");
                return Ok(format!("Weather query failed: {reason}"));
            }
        };

        match self.forecast(&place, days).await {
            Ok(daily) => Ok(format_forecast(&place, &daily)),
            Err(reason) => {
                warn!(location, %reason, "weather lookup failed");
                Ok(format!("Weather query failed: {reason}"))
            }
        }
    }
}

/// Requested forecast length; anything missing or out of range means one day.
fn requested_days(arguments: &Value) -> u64 {
    arguments
        .get("days")
        .and_then(Value::as_u64)
        .filter(|d| (1..=MAX_DAYS).contains(d))
        .unwrap_or(1)
}

// ═══════════════════════════════════════════════════════════════════════
//  Formatting
// ═══════════════════════════════════════════════════════════════════════

/// Render a forecast as one line per day.
pub fn format_forecast(place: &Place, daily: &DailyForecast) -> String {
    let mut out = format!("Weather forecast for {}:", place.label());

    if daily.time.is_empty() {
        out.push_str("\nNo forecast data available.");
        return out;
    }

    for (i, date) in daily.time.iter().enumerate() {
        let sky = daily
            .weather_code
            .get(i)
            .copied()
            .flatten()
            .map_or("Unknown conditions", describe_weather_code);
        out.push_str(&format!("\n{date}: {sky}"));

        let low = daily.temperature_2m_min.get(i).copied().flatten();
        let high = daily.temperature_2m_max.get(i).copied().flatten();
        if let (Some(low), Some(high)) = (low, high) {
            out.push_str(&format!(", {low:.1}°C to {high:.1}°C"));
        }

        if let Some(rain) = daily.precipitation_probability_max.get(i).copied().flatten() {
            out.push_str(&format!(", precipitation chance {rain:.0}%"));
        }
    }
    out
}

/// Plain-language description of a WMO weather interpretation code.
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 => "Rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 | 73 => "Snow",
        75 | 77 => "Heavy snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown conditions",
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
