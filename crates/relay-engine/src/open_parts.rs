//! Tracks stream parts that have been opened but not yet closed.

use relay_core::UiMessageChunk;
use serde_json::Value;

/// Open step, text block and tool parts, as seen from emitted chunks.
#[derive(Debug, Default)]
pub(crate) struct OpenParts {
    step: bool,
    text: Option<String>,
    /// Tool inputs still streaming: `(tool_call_id, tool_name)`.
    inputs: Vec<(String, String)>,
    /// Tool calls whose input was accepted but have no output yet.
    outputs: Vec<String>,
}

impl OpenParts {
    pub fn track(&mut self, chunk: &UiMessageChunk) {
        match chunk {
            UiMessageChunk::StartStep => self.step = true,
            UiMessageChunk::FinishStep => self.step = false,
            UiMessageChunk::TextStart { id } => self.text = Some(id.clone()),
            UiMessageChunk::TextEnd { .. } => self.text = None,
            UiMessageChunk::ToolInputStart { tool_call_id, tool_name } => {
                self.inputs.push((tool_call_id.clone(), tool_name.clone()));
            }
            UiMessageChunk::ToolInputAvailable { tool_call_id, .. } => {
                self.inputs.retain(|(id, _)| id != tool_call_id);
                self.outputs.push(tool_call_id.clone());
            }
            UiMessageChunk::ToolInputError { tool_call_id, .. } => {
                self.inputs.retain(|(id, _)| id != tool_call_id);
            }
            UiMessageChunk::ToolOutputAvailable { tool_call_id, .. }
            | UiMessageChunk::ToolOutputError { tool_call_id, .. } => {
                self.outputs.retain(|id| id != tool_call_id);
            }
            _ => {}
        }
    }

    /// Returns the chunks that close every open part, innermost first.
    /// Pending tool parts fail with `error_text`.
    pub fn close(&mut self, error_text: &str) -> Vec<UiMessageChunk> {
        let mut chunks = Vec::new();

        if let Some(id) = self.text.take() {
            chunks.push(UiMessageChunk::TextEnd { id });
        }
        for (tool_call_id, tool_name) in self.inputs.drain(..) {
            chunks.push(UiMessageChunk::ToolInputError {
                tool_call_id,
                tool_name,
                input: Value::Null,
                error_text: error_text.to_string(),
            });
        }
        for tool_call_id in self.outputs.drain(..) {
            chunks.push(UiMessageChunk::ToolOutputError {
                tool_call_id,
                error_text: error_text.to_string(),
            });
        }
        if std::mem::take(&mut self.step) {
            chunks.push(UiMessageChunk::FinishStep);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracked(chunks: Vec<UiMessageChunk>) -> OpenParts {
        let mut open = OpenParts::default();
        for chunk in &chunks {
            open.track(chunk);
        }
        open
    }

    #[test]
    fn closes_text_tools_and_step() {
        let mut open = tracked(vec![
            UiMessageChunk::StartStep,
            UiMessageChunk::ToolInputStart { tool_call_id: "a".into(), tool_name: "fetch_weather_data".into() },
            UiMessageChunk::ToolInputAvailable {
                tool_call_id: "a".into(),
                tool_name: "fetch_weather_data".into(),
                input: json!({ "location": "Oslo" }),
            },
            UiMessageChunk::ToolInputStart { tool_call_id: "b".into(), tool_name: "generate_ui".into() },
            UiMessageChunk::TextStart { id: "text_1".into() },
        ]);

        assert_eq!(
            open.close("timed out"),
            vec![
                UiMessageChunk::TextEnd { id: "text_1".into() },
                UiMessageChunk::ToolInputError {
                    tool_call_id: "b".into(),
                    tool_name: "generate_ui".into(),
                    input: Value::Null,
                    error_text: "timed out".into(),
                },
                UiMessageChunk::ToolOutputError { tool_call_id: "a".into(), error_text: "timed out".into() },
                UiMessageChunk::FinishStep,
            ]
        );
        assert!(open.close("again").is_empty());
    }

    #[test]
    fn finished_parts_need_no_closing() {
        let mut open = tracked(vec![
            UiMessageChunk::StartStep,
            UiMessageChunk::TextStart { id: "text_1".into() },
            UiMessageChunk::TextEnd { id: "text_1".into() },
            UiMessageChunk::ToolInputStart { tool_call_id: "a".into(), tool_name: "generate_ui".into() },
            UiMessageChunk::ToolInputError {
                tool_call_id: "a".into(),
                tool_name: "generate_ui".into(),
                input: json!({}),
                error_text: "Invalid arguments".into(),
            },
            UiMessageChunk::FinishStep,
        ]);

        assert!(open.close("late").is_empty());
    }
}
