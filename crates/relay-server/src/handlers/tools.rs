//! Tool-related HTTP handlers.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::ToolInfo;
use crate::ServerState;

/// Lists the tools declared to the model.
pub async fn list(State(state): State<Arc<ServerState>>) -> Json<Vec<ToolInfo>> {
    let tools = state.tool_registry.list()
        .into_iter()
        .map(|s| ToolInfo {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect();

    Json(tools)
}
