//! Core domain types and error definitions for relay.
//!
//! This crate provides the fundamental types shared across the relay workspace:
//!
//! - [`AgentError`] — Error type for provider and relay operations
//! - [`UiMessage`] and [`UiPart`] — Messages as sent by the chat front-end
//! - [`ModelMessage`] — Messages in the shape the completion provider expects
//! - [`UiMessageChunk`] — Events of the UI message stream protocol
//! - [`ToolCall`], [`ToolSchema`] — Tool interaction types
//!
//! # Example
//!
//! ```rust
//! use relay_core::{convert_to_model_messages, ModelMessage, UiMessage};
//!
//! let messages: Vec<UiMessage> = serde_json::from_str(
//!     r#"[{"id":"1","role":"user","parts":[{"type":"text","text":"Weather in Oslo?"}]}]"#,
//! ).unwrap();
//!
//! let converted = convert_to_model_messages(&messages).unwrap();
//! assert!(matches!(converted[0], ModelMessage::User(_)));
//! ```

mod message;
mod stream;

pub use message::{
    convert_to_model_messages, ModelMessage, ToolPartState, ToolUiPart, UiMessage, UiPart,
    UiRole, UserContent,
};
pub use stream::UiMessageChunk;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while relaying a conversation.
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM API request failed.
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Failed to parse a payload.
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// Incoming messages could not be converted for the provider.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// External API call failed.
    #[error("External API error: {0}")]
    ExternalApi(String),

    /// The response did not complete within the allowed duration.
    #[error("Response exceeded {0}s limit")]
    DeadlineExceeded(u64),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ParseError(err.to_string())
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool call requested by the LLM.
///
/// When an LLM decides to use a tool, it returns one or more `ToolCall`
/// instances with the tool name and arguments to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments to pass to the tool (JSON object).
    pub arguments: serde_json::Value,
}

/// JSON schema describing a tool for LLM function calling.
///
/// This follows the OpenAI function calling format and is used
/// to inform the LLM about available tools and their parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name of the tool (e.g., "fetch_weather_data").
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}
