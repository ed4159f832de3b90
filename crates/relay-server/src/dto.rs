//! Data transfer objects for HTTP message serialization.

use relay_core::UiMessage;
use serde::{Deserialize, Serialize};

/// Request body for the chat endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
}

/// Tool schema for API responses.
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
