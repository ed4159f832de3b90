//! Relay loop between the model provider, the tool registry and the UI stream.
//!
//! Each model call is one step. A step streams text and tool-call fragments
//! out as [`UiMessageChunk`]s; if the model asked for tools, they run, their
//! results are appended to the conversation and the next step starts. The loop
//! ends when a step produces no tool calls, the provider fails or the step
//! limit is reached. Failures close any part still open before the `error`
//! chunk, so every `start` has its matching end.

mod open_parts;
mod tool_calls;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::StreamExt;
use relay_core::{AgentError, ModelMessage, ToolCall, ToolSchema, UiMessageChunk};
use relay_llm::{CompletionProvider, StreamChunk};
use relay_tools::ToolRegistry;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::open_parts::OpenParts;
use crate::tool_calls::{ReadyCall, ToolCallAccumulator};

/// Sending half of a relay's chunk channel.
pub type ChunkSender = mpsc::Sender<UiMessageChunk>;

/// The receiving side hung up; nothing more can be delivered.
#[derive(Debug)]
struct ClientGone;

/// Chunk channel that remembers which parts it has left open.
struct Sink<'a> {
    tx: &'a ChunkSender,
    open: OpenParts,
}

impl<'a> Sink<'a> {
    fn new(tx: &'a ChunkSender) -> Self {
        Self { tx, open: OpenParts::default() }
    }

    async fn emit(&mut self, chunk: UiMessageChunk) -> Result<(), ClientGone> {
        self.open.track(&chunk);
        self.tx.send(chunk).await.map_err(|_| ClientGone)
    }

    /// Closes every open part, then reports `err` as an `error` chunk.
    async fn fail(&mut self, err: impl ToString) -> Result<(), ClientGone> {
        let error_text = err.to_string();
        for chunk in self.open.close(&error_text) {
            self.emit(chunk).await?;
        }
        self.emit(UiMessageChunk::error(error_text)).await
    }
}

/// How a step ended.
enum StepOutcome {
    /// The model produced final output.
    Done,
    /// Tools ran; the model should see their results.
    ToolsExecuted,
    /// The provider failed.
    Failed(AgentError),
}

/// A tool call after argument parsing and validation.
enum Prepared {
    Run(ToolCall),
    Rejected { call: ToolCall, error_text: String },
}

impl Prepared {
    fn call(&self) -> &ToolCall {
        match self {
            Prepared::Run(call) | Prepared::Rejected { call, .. } => call,
        }
    }
}

/// Streams one conversation through the model, executing tools on its behalf.
pub struct ChatRelay {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
}

impl ChatRelay {
    pub fn new(provider: Arc<dyn CompletionProvider>, tools: Arc<ToolRegistry>, max_steps: usize) -> Self {
        Self {
            provider,
            tools,
            max_steps: max_steps.max(1),
        }
    }

    /// Spawns the relay on the runtime and returns its chunk stream.
    pub fn spawn(self: Arc<Self>, messages: Vec<ModelMessage>, deadline: Duration) -> ReceiverStream<UiMessageChunk> {
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            self.run_with_deadline(messages, deadline, &tx).await;
        });

        ReceiverStream::new(rx)
    }

    /// Runs the relay, cutting it off once `deadline` elapses. Parts left open
    /// at that point are closed before the `error` chunk.
    pub async fn run_with_deadline(&self, messages: Vec<ModelMessage>, deadline: Duration, tx: &ChunkSender) {
        let mut sink = Sink::new(tx);
        let outcome = tokio::time::timeout(deadline, self.relay(messages, &mut sink)).await;

        match outcome {
            Ok(Ok(())) => return,
            Ok(Err(ClientGone)) => {
                debug!("Client disconnected, relay stopped");
                return;
            }
            Err(_) => warn!("Relay exceeded {:?}, aborting", deadline),
        }

        let err = AgentError::DeadlineExceeded(deadline.as_secs());
        if sink.fail(err).await.is_ok() {
            let _ = sink.emit(UiMessageChunk::Finish { message_metadata: None }).await;
        }
    }

    /// Runs the relay to completion, sending every chunk to `tx`.
    pub async fn run(&self, messages: Vec<ModelMessage>, tx: &ChunkSender) {
        if self.relay(messages, &mut Sink::new(tx)).await.is_err() {
            debug!("Client disconnected, relay stopped");
        }
    }

    async fn relay(&self, mut messages: Vec<ModelMessage>, sink: &mut Sink<'_>) -> Result<(), ClientGone> {
        let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        sink.emit(UiMessageChunk::Start { message_id: Some(message_id) }).await?;

        if messages.is_empty() {
            info!("Empty conversation, nothing to send");
            return sink.emit(UiMessageChunk::Finish { message_metadata: None }).await;
        }

        let schemas = self.tools.list();
        let mut text_counter = 0usize;

        for step in 1..=self.max_steps {
            info!("Step {}/{} ({} messages)", step, self.max_steps, messages.len());
            sink.emit(UiMessageChunk::StartStep).await?;

            match self.step(&mut messages, &schemas, &mut text_counter, sink).await? {
                StepOutcome::Failed(e) => {
                    sink.fail(e).await?;
                    break;
                }
                StepOutcome::Done => {
                    sink.emit(UiMessageChunk::FinishStep).await?;
                    break;
                }
                StepOutcome::ToolsExecuted => {
                    sink.emit(UiMessageChunk::FinishStep).await?;
                    if step == self.max_steps {
                        warn!("Max steps ({}) reached", self.max_steps);
                    }
                }
            }
        }

        sink.emit(UiMessageChunk::Finish { message_metadata: None }).await
    }

    async fn step(
        &self,
        messages: &mut Vec<ModelMessage>,
        schemas: &[ToolSchema],
        text_counter: &mut usize,
        sink: &mut Sink<'_>,
    ) -> Result<StepOutcome, ClientGone> {
        let mut stream = match self.provider.chat_stream(messages.as_slice(), schemas).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Chat error: {}", e);
                return Ok(StepOutcome::Failed(e));
            }
        };

        let mut text_id: Option<String> = None;
        let mut text = String::new();
        let mut calls = ToolCallAccumulator::default();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(StreamChunk::Content(delta)) => {
                    if text_id.is_none() {
                        *text_counter += 1;
                        let id = format!("text_{}", text_counter);
                        sink.emit(UiMessageChunk::TextStart { id: id.clone() }).await?;
                        text_id = Some(id);
                    }
                    let id = text_id.clone().unwrap_or_default();
                    text.push_str(&delta);
                    sink.emit(UiMessageChunk::TextDelta { id, delta }).await?;
                }
                Ok(StreamChunk::ToolCallDelta { index, id, name, arguments }) => {
                    for chunk in calls.apply(index, id, name, arguments) {
                        sink.emit(chunk).await?;
                    }
                }
                Ok(StreamChunk::Finish(reason)) => debug!("Finish reason: {:?}", reason),
                Ok(StreamChunk::Usage { input_tokens, output_tokens }) => {
                    info!("Tokens: {}/{} (in/out)", input_tokens, output_tokens);
                }
                Err(e) => {
                    error!("Stream error: {}", e);
                    return Ok(StepOutcome::Failed(e));
                }
            }
        }

        if let Some(id) = text_id {
            sink.emit(UiMessageChunk::TextEnd { id }).await?;
        }

        if calls.is_empty() {
            return Ok(StepOutcome::Done);
        }

        match self.execute_tools(messages, text, calls.finish(), sink).await? {
            true => Ok(StepOutcome::ToolsExecuted),
            false => Ok(StepOutcome::Done),
        }
    }

    /// Validates, runs and reports a step's tool calls, then appends the
    /// assistant call message and one tool message per call.
    ///
    /// Calls that never received a name are reported but left out of the
    /// history. Returns whether anything was appended.
    async fn execute_tools(
        &self,
        messages: &mut Vec<ModelMessage>,
        text: String,
        ready: Vec<ReadyCall>,
        sink: &mut Sink<'_>,
    ) -> Result<bool, ClientGone> {
        let mut prepared = Vec::with_capacity(ready.len());

        for call in ready {
            let (input, parsed) = match call.input() {
                Ok(input) => (input, Ok(())),
                Err(e) => (
                    Value::String(call.arguments.clone()),
                    Err(format!("Invalid JSON arguments: {}", e)),
                ),
            };
            let validated = parsed.and_then(|_| {
                self.tools.validate(&call.name, &input).map_err(|e| e.to_string())
            });
            let tool_call = ToolCall { id: call.id, name: call.name, arguments: input };

            match validated {
                Ok(()) => {
                    sink.emit(UiMessageChunk::ToolInputAvailable {
                        tool_call_id: tool_call.id.clone(),
                        tool_name: tool_call.name.clone(),
                        input: tool_call.arguments.clone(),
                    })
                    .await?;
                    prepared.push(Prepared::Run(tool_call));
                }
                Err(error_text) => {
                    warn!("Rejected tool call {} ({}): {}", tool_call.name, tool_call.id, error_text);
                    sink.emit(UiMessageChunk::ToolInputError {
                        tool_call_id: tool_call.id.clone(),
                        tool_name: tool_call.name.clone(),
                        input: tool_call.arguments.clone(),
                        error_text: error_text.clone(),
                    })
                    .await?;
                    prepared.push(Prepared::Rejected { call: tool_call, error_text });
                }
            }
        }

        let results = join_all(prepared.iter().map(|p| async move {
            match p {
                Prepared::Run(call) => {
                    info!("Executing tool: {}", call.name);
                    self.tools
                        .execute(&call.name, call.arguments.clone())
                        .await
                        .map_err(|e| e.to_string())
                }
                Prepared::Rejected { error_text, .. } => Err(error_text.clone()),
            }
        }))
        .await;

        let mut tool_calls = Vec::with_capacity(prepared.len());
        let mut tool_results = Vec::with_capacity(prepared.len());

        for (p, result) in prepared.iter().zip(results) {
            let call = p.call();
            let content = match (p, result) {
                (Prepared::Run(_), Ok(output)) => {
                    info!("Tool {} returned", call.name);
                    sink.emit(UiMessageChunk::ToolOutputAvailable {
                        tool_call_id: call.id.clone(),
                        output: output.clone(),
                    })
                    .await?;
                    output.to_string()
                }
                (Prepared::Run(_), Err(error_text)) => {
                    error!("Tool {} failed: {}", call.name, error_text);
                    sink.emit(UiMessageChunk::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: error_text.clone(),
                    })
                    .await?;
                    error_text
                }
                (Prepared::Rejected { .. }, result) => result.err().unwrap_or_default(),
            };

            if call.name.is_empty() {
                warn!("Dropping unnamed tool call {} from history", call.id);
                continue;
            }
            tool_calls.push(call.clone());
            tool_results.push(ModelMessage::Tool { tool_call_id: call.id.clone(), content });
        }

        if tool_calls.is_empty() {
            return Ok(false);
        }

        messages.push(ModelMessage::Assistant { text, tool_calls });
        messages.extend(tool_results);
        Ok(true)
    }
}
