//! Chat front-end messages and their conversion into provider messages.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{AgentError, ToolCall};

/// Role of a message sent by the chat front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

/// A single message in the front-end conversation history.
#[derive(Debug, Clone, Deserialize)]
pub struct UiMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: UiRole,
    #[serde(default)]
    pub parts: Vec<UiPart>,
    /// Plain-text body sent by older clients that predate message parts.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Lifecycle state of a tool invocation as tracked by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPartState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
    #[serde(other)]
    Unknown,
}

/// A tool invocation recorded in an assistant message.
#[derive(Debug, Clone)]
pub struct ToolUiPart {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolPartState,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

/// One content part of a [`UiMessage`].
#[derive(Debug, Clone)]
pub enum UiPart {
    Text { text: String },
    Reasoning { text: String },
    File { media_type: String, url: String, filename: Option<String> },
    StepStart,
    Tool(ToolUiPart),
    DynamicTool(ToolUiPart),
    Unknown,
}

#[derive(Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePart {
    media_type: String,
    url: String,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolPart {
    #[serde(default)]
    tool_name: Option<String>,
    tool_call_id: String,
    state: ToolPartState,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error_text: Option<String>,
}

impl RawToolPart {
    fn into_part(self, tool_name: String) -> ToolUiPart {
        ToolUiPart {
            tool_name,
            tool_call_id: self.tool_call_id,
            state: self.state,
            input: self.input,
            output: self.output,
            error_text: self.error_text,
        }
    }
}

impl<'de> Deserialize<'de> for UiPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let type_str = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?
            .to_string();

        match type_str.as_str() {
            "text" => {
                let part: TextPart = serde_json::from_value(value).map_err(de::Error::custom)?;
                Ok(Self::Text { text: part.text })
            }
            "reasoning" => {
                let part: TextPart = serde_json::from_value(value).map_err(de::Error::custom)?;
                Ok(Self::Reasoning { text: part.text })
            }
            "file" => {
                let part: FilePart = serde_json::from_value(value).map_err(de::Error::custom)?;
                Ok(Self::File {
                    media_type: part.media_type,
                    url: part.url,
                    filename: part.filename,
                })
            }
            "step-start" => Ok(Self::StepStart),
            "dynamic-tool" => {
                let raw: RawToolPart = serde_json::from_value(value).map_err(de::Error::custom)?;
                let name = raw
                    .tool_name
                    .clone()
                    .ok_or_else(|| de::Error::missing_field("toolName"))?;
                Ok(Self::DynamicTool(raw.into_part(name)))
            }
            t if t.starts_with("tool-") => {
                let raw: RawToolPart = serde_json::from_value(value).map_err(de::Error::custom)?;
                let name = raw
                    .tool_name
                    .clone()
                    .unwrap_or_else(|| t.trim_start_matches("tool-").to_string());
                Ok(Self::Tool(raw.into_part(name)))
            }
            _ => Ok(Self::Unknown),
        }
    }
}

/// Content of a user message as forwarded to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    Image { url: String },
}

/// A message in the shape the completion provider expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelMessage {
    System(String),
    User(Vec<UserContent>),
    Assistant { text: String, tool_calls: Vec<ToolCall> },
    Tool { tool_call_id: String, content: String },
}

impl ModelMessage {
    /// Creates a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(vec![UserContent::Text(text.into())])
    }
}

/// Accumulates one assistant step until a `step-start` boundary.
#[derive(Default)]
struct AssistantBlock {
    text: String,
    tool_calls: Vec<ToolCall>,
    results: Vec<ModelMessage>,
}

impl AssistantBlock {
    fn flush_into(&mut self, out: &mut Vec<ModelMessage>) {
        let block = std::mem::take(self);
        if block.text.is_empty() && block.tool_calls.is_empty() {
            return;
        }
        out.push(ModelMessage::Assistant { text: block.text, tool_calls: block.tool_calls });
        out.extend(block.results);
    }

    fn push_tool(&mut self, part: &ToolUiPart) -> Result<(), AgentError> {
        if part.tool_name.is_empty() {
            return Err(AgentError::InvalidMessage(format!(
                "tool part {} has no tool name",
                part.tool_call_id
            )));
        }

        let content = match part.state {
            ToolPartState::OutputAvailable => {
                let output = part.output.clone().unwrap_or(Value::Null);
                serde_json::to_string(&output)?
            }
            ToolPartState::OutputError => part.error_text.clone().unwrap_or_default(),
            // A call without a result cannot be replayed to the provider.
            _ => return Ok(()),
        };

        self.tool_calls.push(ToolCall {
            id: part.tool_call_id.clone(),
            name: part.tool_name.clone(),
            arguments: part.input.clone().unwrap_or_else(|| Value::Object(Default::default())),
        });
        self.results.push(ModelMessage::Tool {
            tool_call_id: part.tool_call_id.clone(),
            content,
        });
        Ok(())
    }
}

fn legacy_text(message: &UiMessage) -> Option<&str> {
    match message.parts.is_empty() {
        true => message.content.as_deref().filter(|c| !c.is_empty()),
        false => None,
    }
}

fn convert_system(message: &UiMessage, out: &mut Vec<ModelMessage>) {
    let mut text: String = message
        .parts
        .iter()
        .filter_map(|p| match p {
            UiPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    if let Some(legacy) = legacy_text(message) {
        text.push_str(legacy);
    }

    if !text.is_empty() {
        out.push(ModelMessage::System(text));
    }
}

fn convert_user(message: &UiMessage, out: &mut Vec<ModelMessage>) {
    let mut content: Vec<UserContent> = message
        .parts
        .iter()
        .filter_map(|p| match p {
            UiPart::Text { text } => Some(UserContent::Text(text.clone())),
            UiPart::File { media_type, url, .. } if media_type.starts_with("image/") => {
                Some(UserContent::Image { url: url.clone() })
            }
            _ => None,
        })
        .collect();

    if let Some(legacy) = legacy_text(message) {
        content.push(UserContent::Text(legacy.to_string()));
    }

    if !content.is_empty() {
        out.push(ModelMessage::User(content));
    }
}

fn convert_assistant(message: &UiMessage, out: &mut Vec<ModelMessage>) -> Result<(), AgentError> {
    let mut block = AssistantBlock::default();

    if let Some(legacy) = legacy_text(message) {
        block.text.push_str(legacy);
    }

    for part in &message.parts {
        match part {
            UiPart::StepStart => block.flush_into(out),
            UiPart::Text { text } => block.text.push_str(text),
            UiPart::Tool(tool) | UiPart::DynamicTool(tool) => block.push_tool(tool)?,
            UiPart::Reasoning { .. } | UiPart::File { .. } | UiPart::Unknown => {}
        }
    }

    block.flush_into(out);
    Ok(())
}

/// Converts front-end messages into provider messages.
///
/// Assistant messages are split at `step-start` boundaries; completed tool
/// parts become an assistant tool call followed by a tool result message.
/// Parts with nothing to forward (reasoning, non-image files, pending tool
/// calls) are dropped.
pub fn convert_to_model_messages(messages: &[UiMessage]) -> Result<Vec<ModelMessage>, AgentError> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            UiRole::System => convert_system(message, &mut out),
            UiRole::User => convert_user(message, &mut out),
            UiRole::Assistant => convert_assistant(message, &mut out)?,
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Vec<UiMessage> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_user_text_and_images() {
        let messages = parse(json!([{
            "id": "m1",
            "role": "user",
            "parts": [
                { "type": "text", "text": "What is this?" },
                { "type": "file", "mediaType": "image/png", "url": "data:image/png;base64,AAAA" },
                { "type": "file", "mediaType": "application/pdf", "url": "https://x/doc.pdf" }
            ]
        }]));

        let converted = convert_to_model_messages(&messages).unwrap();
        assert_eq!(
            converted,
            vec![ModelMessage::User(vec![
                UserContent::Text("What is this?".into()),
                UserContent::Image { url: "data:image/png;base64,AAAA".into() },
            ])]
        );
    }

    #[test]
    fn joins_system_text_parts() {
        let messages = parse(json!([{
            "role": "system",
            "parts": [{ "type": "text", "text": "Be " }, { "type": "text", "text": "brief." }]
        }]));

        let converted = convert_to_model_messages(&messages).unwrap();
        assert_eq!(converted, vec![ModelMessage::System("Be brief.".into())]);
    }

    #[test]
    fn replays_completed_tool_calls_with_results() {
        let messages = parse(json!([{
            "role": "assistant",
            "parts": [
                { "type": "step-start" },
                {
                    "type": "tool-fetch_weather_data",
                    "toolCallId": "call_1",
                    "state": "output-available",
                    "input": { "location": "Oslo" },
                    "output": { "temperature": "12°C" }
                },
                { "type": "step-start" },
                { "type": "text", "text": "It is 12°C in Oslo." }
            ]
        }]));

        let converted = convert_to_model_messages(&messages).unwrap();
        assert_eq!(converted.len(), 3);
        assert_eq!(
            converted[0],
            ModelMessage::Assistant {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "fetch_weather_data".into(),
                    arguments: json!({ "location": "Oslo" }),
                }],
            }
        );
        assert_eq!(
            converted[1],
            ModelMessage::Tool {
                tool_call_id: "call_1".into(),
                content: r#"{"temperature":"12°C"}"#.into(),
            }
        );
        assert_eq!(
            converted[2],
            ModelMessage::Assistant { text: "It is 12°C in Oslo.".into(), tool_calls: vec![] }
        );
    }

    #[test]
    fn tool_errors_are_replayed_as_text() {
        let messages = parse(json!([{
            "role": "assistant",
            "parts": [{
                "type": "dynamic-tool",
                "toolName": "generate_ui",
                "toolCallId": "call_9",
                "state": "output-error",
                "input": { "prompt": "a button" },
                "errorText": "upstream timed out"
            }]
        }]));

        let converted = convert_to_model_messages(&messages).unwrap();
        assert_eq!(
            converted[1],
            ModelMessage::Tool { tool_call_id: "call_9".into(), content: "upstream timed out".into() }
        );
    }

    #[test]
    fn drops_pending_tool_calls_and_reasoning() {
        let messages = parse(json!([{
            "role": "assistant",
            "parts": [
                { "type": "reasoning", "text": "thinking" },
                { "type": "tool-generate_ui", "toolCallId": "c", "state": "input-streaming" },
                { "type": "source-url", "url": "https://example.com" }
            ]
        }]));

        assert!(convert_to_model_messages(&messages).unwrap().is_empty());
    }

    #[test]
    fn rejects_tool_part_without_name() {
        let messages = parse(json!([{
            "role": "assistant",
            "parts": [{ "type": "tool-", "toolCallId": "c", "state": "output-available", "output": 1 }]
        }]));

        let err = convert_to_model_messages(&messages).unwrap_err();
        assert!(matches!(err, AgentError::InvalidMessage(_)));
    }

    #[test]
    fn accepts_legacy_content_field() {
        let messages = parse(json!([{ "role": "user", "content": "hi" }]));
        assert_eq!(convert_to_model_messages(&messages).unwrap(), vec![ModelMessage::user("hi")]);
    }

    #[test]
    fn unknown_role_fails_to_parse() {
        let result: Result<Vec<UiMessage>, _> =
            serde_json::from_value(json!([{ "role": "narrator", "parts": [] }]));
        assert!(result.is_err());
    }

    #[test]
    fn empty_history_converts_to_nothing() {
        assert!(convert_to_model_messages(&[]).unwrap().is_empty());
    }
}
