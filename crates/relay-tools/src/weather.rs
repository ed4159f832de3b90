//! `fetch_weather_data`: synthetic weather reports with simulated latency.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{parse_args, require_non_empty, Tool, ToolError};

/// Source of pseudo-random integers.
pub trait RandomSource: Send + Sync {
    /// Returns an integer in `range` (end exclusive).
    fn int_in(&self, range: Range<i32>) -> i32;
}

/// [`RandomSource`] backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn int_in(&self, range: Range<i32>) -> i32 {
        rand::thread_rng().gen_range(range)
    }
}

/// Waits for a duration.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// [`Delay`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Temperature unit requested by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    fn temperature_range(self) -> Range<i32> {
        match self {
            Self::Celsius => 5..40,
            Self::Fahrenheit => 41..104,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    fn speed_unit(self) -> &'static str {
        match self {
            Self::Celsius => "km/h",
            Self::Fahrenheit => "mph",
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherParams {
    location: String,
    #[serde(default)]
    units: TemperatureUnit,
}

/// Result of `fetch_weather_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub location: String,
    pub temperature: String,
    pub conditions: String,
    pub humidity: String,
    pub wind_speed: String,
    pub last_updated: String,
}

/// Mock weather lookup. Nothing leaves the process.
pub struct WeatherTool {
    latency: Duration,
    random: Arc<dyn RandomSource>,
    delay: Arc<dyn Delay>,
}

impl WeatherTool {
    /// Creates the tool with the thread RNG and the tokio timer.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            random: Arc::new(ThreadRandom),
            delay: Arc::new(TokioDelay),
        }
    }

    /// Replaces the randomness source.
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Arc::new(random);
        self
    }

    /// Replaces the wait primitive.
    pub fn with_delay(mut self, delay: impl Delay + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    fn report(&self, location: String, units: TemperatureUnit) -> WeatherReport {
        let temp = self.random.int_in(units.temperature_range());

        WeatherReport {
            location,
            temperature: format!("{}°{}", temp, units.symbol()),
            conditions: "Sunny".to_string(),
            humidity: "12%".to_string(),
            wind_speed: format!("35 {}", units.speed_unit()),
            last_updated: chrono::Local::now()
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string(),
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "fetch_weather_data"
    }

    fn description(&self) -> &str {
        "Fetch weather information for a specific location"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The city or location to get weather for"
                },
                "units": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "default": "celsius",
                    "description": "Temperature units"
                }
            },
            "required": ["location"]
        })
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let params: WeatherParams = parse_args(args)?;
        require_non_empty("location", &params.location)
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let params: WeatherParams = parse_args(&args)?;
        debug!("Weather lookup: {} ({:?})", params.location, params.units);

        self.delay.wait(self.latency).await;

        let report = self.report(params.location, params.units);
        serde_json::to_value(&report).map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to serialize report: {}", e))
        })
    }
}
