//! Tool registry and built-in tools for relay.
//!
//! This crate provides the tool abstraction for LLM function calling:
//!
//! - [`Tool`] — Trait for implementing tools
//! - [`ToolRegistry`] — Registry of the tools declared to the model
//! - [`WeatherTool`] — `fetch_weather_data`, synthetic weather reports
//! - [`GenerateUiTool`] — `generate_ui`, UI generation through the v0 API
//!
//! # Using the Registry
//!
//! ```rust,ignore
//! use relay_tools::ToolRegistry;
//!
//! let registry = ToolRegistry::with_defaults(&settings);
//!
//! // Schemas for the model
//! let schemas = registry.list();
//!
//! // Validate, then run a call the model asked for
//! registry.validate("fetch_weather_data", &args)?;
//! let output = registry.execute("fetch_weather_data", args).await?;
//! ```

mod generate_ui;
mod v0;
mod weather;

pub use generate_ui::{GenerateUiTool, UiGeneration, UI_SYSTEM_PROMPT};
pub use v0::{
    ChatCreation, ChatDetail, ChatSummary, ChatVersion, CreateChatRequest, ModelConfiguration,
    UiGenerationClient, V0Client,
};
pub use weather::{
    Delay, RandomSource, TemperatureUnit, ThreadRandom, TokioDelay, WeatherReport, WeatherTool,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_config::Settings;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use relay_core::{ToolCall, ToolSchema};

/// Errors that can occur during tool validation or execution.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool execution failed with a message.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid arguments were passed to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Network request failed.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Deserializes tool arguments into a typed parameter struct.
pub fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    T::deserialize(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Rejects empty or whitespace-only string arguments.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
    match value.trim().is_empty() {
        true => Err(ToolError::InvalidArguments(format!("'{}' must not be empty", field))),
        false => Ok(()),
    }
}

/// Trait for implementing tools that can be called by LLMs.
///
/// Tools are the bridge between LLM reasoning and external actions.
/// `validate` runs before `execute` so malformed calls never reach the tool body.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Checks the arguments against the tool's parameter schema.
    fn validate(&self, args: &Value) -> Result<(), ToolError>;

    /// Executes the tool with validated arguments and returns a JSON result.
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    /// Generates the schema for this tool (default implementation).
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of tools declared to the model.
///
/// Tools are kept in name order so schema listings are stable between requests.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in tools.
    ///
    /// Includes:
    /// - `fetch_weather_data` — synthetic weather, delayed by `settings.weather_latency`
    /// - `generate_ui` — v0 chat creation, authenticated with `settings.api_key`
    ///   and bounded by `settings.v0_timeout`
    pub fn with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();

        registry.register(WeatherTool::new(settings.weather_latency));
        registry.register(GenerateUiTool::new(
            V0Client::new(&settings.v0_api_base, &settings.api_key, settings.v0_timeout),
            &settings.v0_model_id,
        ));

        registry
    }

    /// Registers a tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns schemas for all registered tools.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Returns schemas for the specified tool names.
    ///
    /// Unknown tool names are silently ignored.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.schema()))
            .collect()
    }

    /// Returns true if a tool with the given name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the names of all registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Validates arguments for the named tool.
    pub fn validate(&self, name: &str, args: &Value) -> Result<(), ToolError> {
        self.get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?
            .validate(args)
    }

    /// Validates and executes the named tool.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.validate(&args)?;
        tool.execute(args).await
    }
}

/// Parameters shared by tools that take a single free-text field.
#[derive(Debug, Deserialize)]
pub(crate) struct PromptParams {
    pub prompt: String,
}
