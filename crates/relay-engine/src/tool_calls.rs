//! Reassembles streamed tool-call fragments.

use std::collections::BTreeMap;

use relay_core::UiMessageChunk;
use serde_json::Value;

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    started: bool,
}

/// A tool call whose fragments have all arrived.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReadyCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ReadyCall {
    /// Parses the argument text. Empty arguments mean an empty object.
    pub fn input(&self) -> Result<Value, serde_json::Error> {
        match self.arguments.trim().is_empty() {
            true => Ok(Value::Object(Default::default())),
            false => serde_json::from_str(&self.arguments),
        }
    }
}

/// Collects tool-call fragments per stream index and reports the
/// `tool-input-start`/`tool-input-delta` chunks they produce.
#[derive(Default)]
pub(crate) struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn apply(
        &mut self,
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) -> Vec<UiMessageChunk> {
        let call = self.calls.entry(index).or_default();
        let mut chunks = Vec::new();

        if call.id.is_none() {
            call.id = id.filter(|s| !s.is_empty());
        }
        if call.name.is_none() {
            call.name = name.filter(|s| !s.is_empty());
        }

        let fragment = arguments.unwrap_or_default();
        call.arguments.push_str(&fragment);

        if call.started {
            if let (Some(id), false) = (&call.id, fragment.is_empty()) {
                chunks.push(UiMessageChunk::ToolInputDelta {
                    tool_call_id: id.clone(),
                    input_text_delta: fragment,
                });
            }
            return chunks;
        }

        if let (Some(id), Some(name)) = (&call.id, &call.name) {
            call.started = true;
            chunks.push(UiMessageChunk::ToolInputStart {
                tool_call_id: id.clone(),
                tool_name: name.clone(),
            });
            // Fragments that arrived before the id and name are flushed at once.
            if !call.arguments.is_empty() {
                chunks.push(UiMessageChunk::ToolInputDelta {
                    tool_call_id: id.clone(),
                    input_text_delta: call.arguments.clone(),
                });
            }
        }

        chunks
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Returns the calls in stream-index order.
    pub fn finish(self) -> Vec<ReadyCall> {
        self.calls
            .into_iter()
            .map(|(index, call)| ReadyCall {
                id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                name: call.name.unwrap_or_default(),
                arguments: call.arguments,
            })
            .collect()
    }
}
