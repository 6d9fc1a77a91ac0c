//! `weather-api`: current conditions for a city from OpenWeatherMap.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskbox_core::{Failure, TaskError};
use taskbox_runtime::{Capabilities, FetchOptions, TaskDescriptor, TaskEntry, TaskFn};
use tracing::debug;

use crate::{generate_schema, parse_input, to_output};

const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";
const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

fn default_city() -> String {
    "Unknown".to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherInput {
    #[serde(default = "default_city")]
    pub city: String,
    /// `metric` reports Celsius, anything else Fahrenheit.
    #[serde(default = "default_units")]
    pub units: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherOutput {
    /// `"<city>, <country>"`.
    pub location: String,
    pub temperature: f64,
    /// `C` or `F`.
    pub units: String,
    pub description: String,
    pub humidity: f64,
}

// Upstream response, only the fields we read.
#[derive(Deserialize)]
struct Upstream {
    name: String,
    sys: UpstreamSys,
    main: UpstreamMain,
    weather: Vec<UpstreamWeather>,
}

#[derive(Deserialize)]
struct UpstreamSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamMain {
    temp: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct UpstreamWeather {
    description: String,
}

/// Weather lookup task. The endpoint and key are fixed per registration.
#[derive(Debug, Clone)]
pub struct WeatherApi {
    api_key: String,
    endpoint: String,
}

impl Default for WeatherApi {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl WeatherApi {
    pub const NAME: &'static str = "weather-api";

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn into_descriptor(self) -> TaskDescriptor {
        TaskDescriptor::new(Self::NAME, TaskEntry::unary(self))
            .with_description("Fetches current weather for a city")
            .with_input_schema(generate_schema::<WeatherInput>())
            .with_output_schema(generate_schema::<WeatherOutput>())
    }

    async fn lookup(&self, input: &WeatherInput, caps: &Capabilities) -> Result<WeatherOutput, Failure> {
        let options = FetchOptions::get()
            .query("q", input.city.as_str())
            .query("units", input.units.as_str())
            .query("appid", self.api_key.as_str());
        let response = caps.fetch(&self.endpoint, options, None).await?;

        let data: Upstream = serde_json::from_value(response.body)
            .ok()
            .filter(|d: &Upstream| !d.name.is_empty() && !d.weather.is_empty())
            .ok_or_else(|| caps.errors().data("Invalid response format from weather API"))?;

        let description = data
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .unwrap_or_default();
        let units = if input.units == "metric" { "C" } else { "F" };

        Ok(WeatherOutput {
            location: format!("{}, {}", data.name, data.sys.country.unwrap_or_default()),
            temperature: data.main.temp,
            units: units.to_string(),
            description,
            humidity: data.main.humidity,
        })
    }
}

#[async_trait]
impl TaskFn for WeatherApi {
    async fn call(&self, input: Value, caps: Capabilities) -> Result<Value, Failure> {
        let input: WeatherInput = parse_input(input)?;
        debug!(city = %input.city, units = %input.units, "Looking up weather");

        match self.lookup(&input, &caps).await {
            Ok(output) => to_output(&output),
            Err(failure) if failure.as_tagged().is_some() => Err(failure),
            Err(failure) => Err(TaskError::network(format!(
                "Failed to fetch weather data: {}",
                failure.message()
            ))
            .into()),
        }
    }
}
