//! OpenAI-compatible gateway client with streaming tool calls.
//!
//! The model gateway brokers many providers behind the chat completions API,
//! so one client covers every model identifier (e.g. `openai/gpt-4o`).

use std::pin::Pin;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        ChatCompletionStreamOptions, ChatCompletionTool, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, CreateChatCompletionStreamResponse,
        FinishReason as OpenAiFinishReason, FunctionCall, FunctionObject, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use relay_core::{AgentError, ModelMessage, ToolSchema, UserContent};
use tracing::{debug, info};

/// A chunk from a streaming LLM response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Generated text.
    Content(String),
    /// Fragment of a tool call. `id` and `name` usually arrive on the first
    /// fragment for an `index`; `arguments` arrive as partial JSON text.
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    /// Why the model stopped generating this step.
    Finish(FinishReason),
    Usage { input_tokens: u32, output_tokens: u32 },
}

/// Reason a generation step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl From<OpenAiFinishReason> for FinishReason {
    fn from(reason: OpenAiFinishReason) -> Self {
        match reason {
            OpenAiFinishReason::Stop => Self::Stop,
            OpenAiFinishReason::Length => Self::Length,
            OpenAiFinishReason::ToolCalls | OpenAiFinishReason::FunctionCall => Self::ToolCalls,
            OpenAiFinishReason::ContentFilter => Self::ContentFilter,
        }
    }
}

/// A stream of LLM response chunks.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AgentError>> + Send>>;

/// A backend able to start a streaming generation over a conversation with tools.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a streaming generation. Errors here mean the call never started;
    /// failures mid-stream arrive as `Err` items.
    async fn chat_stream(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolSchema],
    ) -> Result<LlmStream, AgentError>;
}

/// Converts any error into an AgentError::LlmError.
fn llm_err(e: impl ToString) -> AgentError {
    AgentError::LlmError(e.to_string())
}

fn user_content(parts: &[UserContent]) -> ChatCompletionRequestUserMessageContent {
    if let [UserContent::Text(text)] = parts {
        return ChatCompletionRequestUserMessageContent::Text(text.clone());
    }

    let parts = parts
        .iter()
        .map(|part| match part {
            UserContent::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText { text: text.clone() },
            ),
            UserContent::Image { url } => ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl { url: url.clone(), detail: None },
                },
            ),
        })
        .collect();

    ChatCompletionRequestUserMessageContent::Array(parts)
}

/// Converts provider-neutral messages into chat completion request messages.
pub(crate) fn to_request_messages(
    messages: &[ModelMessage],
) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
    messages
        .iter()
        .map(|msg| {
            let converted = match msg {
                ModelMessage::System(text) => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(text.as_str())
                        .build()
                        .map_err(llm_err)?,
                ),
                ModelMessage::User(parts) => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(user_content(parts))
                        .build()
                        .map_err(llm_err)?,
                ),
                ModelMessage::Assistant { text, tool_calls } => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    if !text.is_empty() {
                        builder.content(text.as_str());
                    }
                    if !tool_calls.is_empty() {
                        builder.tool_calls(
                            tool_calls
                                .iter()
                                .map(|call| ChatCompletionMessageToolCall {
                                    id: call.id.clone(),
                                    r#type: ChatCompletionToolType::Function,
                                    function: FunctionCall {
                                        name: call.name.clone(),
                                        arguments: call.arguments.to_string(),
                                    },
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(builder.build().map_err(llm_err)?)
                }
                ModelMessage::Tool { tool_call_id, content } => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(tool_call_id.as_str())
                        .content(content.as_str())
                        .build()
                        .map_err(llm_err)?,
                ),
            };
            Ok(converted)
        })
        .collect()
}

fn to_request_tools(tools: &[ToolSchema]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|t| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: t.name.clone(),
                description: Some(t.description.clone()),
                parameters: Some(t.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Splits one streamed completion response into provider-neutral chunks.
pub(crate) fn map_stream_response(response: CreateChatCompletionStreamResponse) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();

    if let Some(choice) = response.choices.into_iter().next() {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            chunks.push(StreamChunk::Content(content));
        }

        for tc in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = tc
                .function
                .map(|f| (f.name, f.arguments))
                .unwrap_or((None, None));
            chunks.push(StreamChunk::ToolCallDelta { index: tc.index, id: tc.id, name, arguments });
        }

        if let Some(reason) = choice.finish_reason {
            chunks.push(StreamChunk::Finish(reason.into()));
        }
    }

    if let Some(usage) = response.usage {
        chunks.push(StreamChunk::Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        });
    }

    chunks
}

/// Client for the OpenAI-compatible model gateway.
pub struct GatewayClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GatewayClient {
    /// Creates a new client for the given model, gateway base URL and API key.
    pub fn new(model: &str, api_base: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key);

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// Returns the model identifier requests are sent with.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for GatewayClient {
    async fn chat_stream(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolSchema],
    ) -> Result<LlmStream, AgentError> {
        info!(
            "LLM stream: {} ({} messages, {} tools)",
            self.model,
            messages.len(),
            tools.len()
        );

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.model)
            .stream_options(ChatCompletionStreamOptions { include_usage: true })
            .messages(to_request_messages(messages)?);

        if !tools.is_empty() {
            request_builder.tools(to_request_tools(tools));
        }

        let request = request_builder.build().map_err(llm_err)?;
        let stream = self.client.chat().create_stream(request).await.map_err(llm_err)?;

        let mapped = stream.flat_map(|result| {
            let chunks: Vec<Result<StreamChunk, AgentError>> = match result {
                Ok(response) => map_stream_response(response).into_iter().map(Ok).collect(),
                Err(e) => {
                    debug!("Gateway stream error: {}", e);
                    vec![Err(llm_err(e))]
                }
            };
            futures::stream::iter(chunks)
        });

        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ToolCall;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stream_response(choice: Value, usage: Option<Value>) -> CreateChatCompletionStreamResponse {
        let mut body = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "openai/gpt-4o",
            "choices": [choice],
        });
        if let Some(usage) = usage {
            body["usage"] = usage;
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn maps_text_and_finish_reason() {
        let response = stream_response(
            json!({ "index": 0, "delta": { "content": "Sunny" }, "finish_reason": "stop" }),
            None,
        );

        assert_eq!(
            map_stream_response(response),
            vec![StreamChunk::Content("Sunny".into()), StreamChunk::Finish(FinishReason::Stop)]
        );
    }

    #[test]
    fn maps_tool_call_fragments() {
        let response = stream_response(
            json!({
                "index": 0,
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "fetch_weather_data", "arguments": "{\"loc" }
                    }]
                },
                "finish_reason": null
            }),
            None,
        );

        assert_eq!(
            map_stream_response(response),
            vec![StreamChunk::ToolCallDelta {
                index: 0,
                id: Some("call_1".into()),
                name: Some("fetch_weather_data".into()),
                arguments: Some("{\"loc".into()),
            }]
        );
    }

    #[test]
    fn maps_usage() {
        let response = stream_response(
            json!({ "index": 0, "delta": {}, "finish_reason": "tool_calls" }),
            Some(json!({ "prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14 })),
        );

        assert_eq!(
            map_stream_response(response),
            vec![
                StreamChunk::Finish(FinishReason::ToolCalls),
                StreamChunk::Usage { input_tokens: 10, output_tokens: 4 },
            ]
        );
    }

    #[test]
    fn converts_assistant_tool_calls_and_results() {
        let messages = vec![
            ModelMessage::System("You are helpful.".into()),
            ModelMessage::user("Weather in Paris?"),
            ModelMessage::Assistant {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "fetch_weather_data".into(),
                    arguments: json!({ "location": "Paris" }),
                }],
            },
            ModelMessage::Tool { tool_call_id: "call_1".into(), content: "{\"humidity\":\"12%\"}".into() },
        ];

        let converted = serde_json::to_value(to_request_messages(&messages).unwrap()).unwrap();

        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[1]["role"], "user");
        assert_eq!(converted[1]["content"], "Weather in Paris?");
        assert_eq!(converted[2]["role"], "assistant");
        assert_eq!(converted[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(converted[2]["tool_calls"][0]["function"]["name"], "fetch_weather_data");
        assert_eq!(
            converted[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"location":"Paris"}"#
        );
        assert_eq!(converted[3]["role"], "tool");
        assert_eq!(converted[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn converts_multimodal_user_content() {
        let messages = vec![ModelMessage::User(vec![
            UserContent::Text("What is this?".into()),
            UserContent::Image { url: "https://img/cat.png".into() },
        ])];

        let converted = serde_json::to_value(to_request_messages(&messages).unwrap()).unwrap();
        let content = converted[0]["content"].as_array().unwrap();

        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "https://img/cat.png");
    }

    #[tokio::test]
    async fn streams_from_gateway() {
        let server = MockServer::start().await;

        let events = [
            json!({
                "id": "c", "object": "chat.completion.chunk", "created": 1, "model": "m",
                "choices": [{ "index": 0, "delta": { "role": "assistant", "content": "Hel" }, "finish_reason": null }]
            }),
            json!({
                "id": "c", "object": "chat.completion.chunk", "created": 1, "model": "m",
                "choices": [{ "index": 0, "delta": { "content": "lo" }, "finish_reason": "stop" }]
            }),
        ];
        let body: String = events
            .iter()
            .map(|e| format!("data: {}\n\n", e))
            .chain(std::iter::once("data: [DONE]\n\n".to_string()))
            .collect();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::new("m", &format!("{}/v1", server.uri()), "test-key");
        let stream = client
            .chat_stream(&[ModelMessage::user("hi")], &[])
            .await
            .unwrap();

        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Content("Hel".into()),
                StreamChunk::Content("lo".into()),
                StreamChunk::Finish(FinishReason::Stop),
            ]
        );
    }
}
