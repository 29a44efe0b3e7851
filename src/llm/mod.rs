//! LLM transport for the agent under test.
//!
//! Two providers implement [`LlmProvider`]:
//!
//! - [`OllamaClient`] for a local Ollama server (`/api/chat`)
//! - [`ChatCompletionsClient`] for any OpenAI-compatible endpoint
//!
//! ```ignore
//! use agi_bench::llm::{GenerationRequest, LlmProvider, Message, OllamaClient};
//!
//! let client = OllamaClient::local("gemma3:latest")?;
//! let response = client
//!     .generate(GenerationRequest::new("", vec![Message::user("2 + 2?")]))
//!     .await?;
//! println!("{}", response.content());
//! ```

pub mod client;
pub mod ollama;

pub use client::{
    ChatCompletionsClient, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage,
};
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_MODEL, OLLAMA_BASE_URL};
