//! HTTP server entry point and Axum router setup.
//!
//! Loads settings from the environment, wires the gateway client and the
//! built-in tools into a [`ChatRelay`], and serves the chat endpoints.

mod dto;
mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use relay_config::Settings;
use relay_engine::ChatRelay;
use relay_llm::{CompletionProvider, GatewayClient};
use relay_tools::ToolRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub settings: Settings,
    pub tool_registry: Arc<ToolRegistry>,
    pub relay: Arc<ChatRelay>,
}

impl ServerState {
    pub fn new(settings: Settings, provider: Arc<dyn CompletionProvider>, tool_registry: ToolRegistry) -> Self {
        let tool_registry = Arc::new(tool_registry);
        let relay = Arc::new(ChatRelay::new(provider, tool_registry.clone(), settings.max_steps));

        Self {
            settings,
            tool_registry,
            relay,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let state = Arc::new(init_server_state()?);
    let addr = state.settings.bind_addr.clone();

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Builds the router over the given state.
pub fn app(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/api/weather", post(handlers::chat::chat))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/tools", get(handlers::tools::list))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Loads settings and registers the gateway client and the built-in tools.
fn init_server_state() -> Result<ServerState> {
    let settings = Settings::from_env()?;

    let provider = GatewayClient::new(&settings.chat_model, &settings.gateway_base_url, &settings.api_key);
    info!("Using model {} via {}", provider.model(), settings.gateway_base_url);

    let tool_registry = ToolRegistry::with_defaults(&settings);
    info!("Registered {} tools", tool_registry.list().len());
    info!(
        "Max {} steps per request, {}s per response, {}s per UI generation",
        settings.max_steps,
        settings.max_duration.as_secs(),
        settings.v0_timeout.as_secs()
    );

    Ok(ServerState::new(settings, Arc::new(provider), tool_registry))
}

#[cfg(test)]
mod tests;
