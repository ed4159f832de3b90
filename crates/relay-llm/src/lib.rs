//! LLM client abstractions for the relay model gateway.
//!
//! - [`CompletionProvider`] — Seam between the relay loop and any streaming model backend
//! - [`GatewayClient`] — OpenAI-compatible gateway client (default provider)
//! - [`StreamChunk`] — Provider-neutral streaming events, including tool-call fragments
//!
//! # Streaming
//!
//! ```rust,ignore
//! use relay_llm::{CompletionProvider, GatewayClient, StreamChunk};
//! use futures::StreamExt;
//!
//! let client = GatewayClient::new("openai/gpt-4o", "https://ai-gateway.vercel.sh/v1", &api_key);
//! let mut stream = client.chat_stream(&messages, &tools).await?;
//!
//! while let Some(chunk) = stream.next().await {
//!     match chunk? {
//!         StreamChunk::Content(text) => print!("{}", text),
//!         StreamChunk::ToolCallDelta { index, name, arguments, .. } => { /* accumulate */ }
//!         StreamChunk::Finish(reason) => println!("\nfinished: {:?}", reason),
//!         StreamChunk::Usage { .. } => {}
//!     }
//! }
//! ```

mod client;

pub use client::{CompletionProvider, FinishReason, GatewayClient, LlmStream, StreamChunk};
pub use relay_core::{ModelMessage, ToolCall, ToolSchema};
