//! Client for the v0 Platform API chat creation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ToolError;

/// Body of `POST /chats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub system: String,
    pub message: String,
    pub model_configuration: ModelConfiguration,
}

/// Model settings for a v0 chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfiguration {
    pub model_id: String,
    pub image_generations: bool,
    pub thinking: bool,
}

/// A generated version of a chat.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatVersion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
}

/// Full chat returned when the API includes version information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetail {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub latest_version: Option<ChatVersion>,
}

/// Bare chat acknowledgement without version information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
}

/// Result of creating a chat, discriminated on the `latestVersion` key.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCreation {
    DetailedChat(ChatDetail),
    MinimalChat(ChatSummary),
}

impl ChatCreation {
    /// Discriminates a raw API response.
    ///
    /// The presence of `latestVersion` (even as `null`) selects
    /// [`ChatCreation::DetailedChat`].
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value.get("latestVersion") {
            Some(_) => serde_json::from_value(value).map(Self::DetailedChat),
            None => serde_json::from_value(value).map(Self::MinimalChat),
        }
    }
}

/// Remote service that turns a prompt into a generated UI.
#[async_trait]
pub trait UiGenerationClient: Send + Sync {
    async fn create_chat(&self, request: &CreateChatRequest) -> Result<ChatCreation, ToolError>;
}

/// [`UiGenerationClient`] for the v0 Platform API.
pub struct V0Client {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl V0Client {
    /// Creates a client whose requests fail after `timeout`.
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("v0 client build failed ({}), falling back to defaults without timeout", e);
                reqwest::Client::new()
            });

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl UiGenerationClient for V0Client {
    async fn create_chat(&self, request: &CreateChatRequest) -> Result<ChatCreation, ToolError> {
        info!("v0 create chat ({})", request.model_configuration.model_id);

        let response = self
            .client
            .post(format!("{}/chats", self.api_base))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "v0 API error: {} - {}",
                status, body
            )));
        }

        let value: Value = response.json().await.map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to parse v0 response: {}", e))
        })?;
        debug!("v0 response keys: {:?}", value.as_object().map(|o| o.keys().collect::<Vec<_>>()));

        ChatCreation::from_value(value).map_err(|e| {
            ToolError::ExecutionFailed(format!("Unexpected v0 response shape: {}", e))
        })
    }
}
