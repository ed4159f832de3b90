//! `generate_ui`: delegates UI generation to a remote client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::v0::{ChatCreation, CreateChatRequest, ModelConfiguration, UiGenerationClient};
use crate::{parse_args, require_non_empty, PromptParams, Tool, ToolError};

/// System instruction sent with every generation request.
pub const UI_SYSTEM_PROMPT: &str = "You are an expert coder";

/// Links to a generated UI. Both are `null` when the service returned no version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiGeneration {
    pub demo: Option<String>,
    pub web_url: Option<String>,
}

impl From<ChatCreation> for UiGeneration {
    fn from(creation: ChatCreation) -> Self {
        match creation {
            ChatCreation::DetailedChat(detail) => Self {
                demo: detail.latest_version.and_then(|v| v.demo_url),
                web_url: detail.web_url,
            },
            ChatCreation::MinimalChat(_) => Self::default(),
        }
    }
}

pub struct GenerateUiTool {
    client: Arc<dyn UiGenerationClient>,
    model_id: String,
}

impl GenerateUiTool {
    pub fn new(client: impl UiGenerationClient + 'static, model_id: &str) -> Self {
        Self {
            client: Arc::new(client),
            model_id: model_id.to_string(),
        }
    }

    fn request(&self, prompt: String) -> CreateChatRequest {
        CreateChatRequest {
            system: UI_SYSTEM_PROMPT.to_string(),
            message: prompt,
            model_configuration: ModelConfiguration {
                model_id: self.model_id.clone(),
                image_generations: false,
                thinking: false,
            },
        }
    }
}

#[async_trait]
impl Tool for GenerateUiTool {
    fn name(&self) -> &str {
        "generate_ui"
    }

    fn description(&self) -> &str {
        "Generate a UI component based on a prompt"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The description of the UI to generate"
                }
            },
            "required": ["prompt"]
        })
    }

    fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let params: PromptParams = parse_args(args)?;
        require_non_empty("prompt", &params.prompt)
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let params: PromptParams = parse_args(&args)?;
        let creation = self.client.create_chat(&self.request(params.prompt)).await?;

        serde_json::to_value(UiGeneration::from(creation)).map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to serialize result: {}", e))
        })
    }
}
