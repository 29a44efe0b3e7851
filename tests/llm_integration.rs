//! Integration tests for the LLM transport and the agent built on it.
//!
//! Live tests need a running server and are ignored by default:
//!   cargo test --test llm_integration -- --ignored
//! `AGI_BENCH_OLLAMA_URL` and `AGI_BENCH_API_BASE`/`AGI_BENCH_API_KEY` point
//! them at non-default servers.

use std::sync::Arc;

use agi_bench::agent::{AgentClient, LlmAgent};
use agi_bench::llm::{
    ChatCompletionsClient, GenerationRequest, LlmProvider, Message, OllamaClient,
    DEFAULT_OLLAMA_MODEL, OLLAMA_BASE_URL,
};
use agi_bench::LlmError;

/// Nothing listens here.
const UNREACHABLE: &str = "http://127.0.0.1:65535";

fn ollama_url() -> String {
    std::env::var("AGI_BENCH_OLLAMA_URL").unwrap_or_else(|_| OLLAMA_BASE_URL.to_string())
}

#[tokio::test]
async fn test_unreachable_ollama_is_a_request_failure() {
    let client = OllamaClient::new(UNREACHABLE, DEFAULT_OLLAMA_MODEL).unwrap();
    let err = client
        .generate(GenerationRequest::new("", vec![Message::user("hello")]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_request_failure() {
    let client = ChatCompletionsClient::new(UNREACHABLE, None, "any-model").unwrap();
    let err = client
        .generate(GenerationRequest::new("", vec![Message::user("hello")]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_agent_swallows_transport_failures() {
    let provider = Arc::new(OllamaClient::new(UNREACHABLE, DEFAULT_OLLAMA_MODEL).unwrap());
    let mut agent = LlmAgent::new(provider);

    let solution = agent.solve("What is 2 + 2?").await;
    assert!(solution.communication_failed);
    assert!(solution.text.is_empty());
    // Failed turns are not kept in the conversation.
    assert!(agent.session().is_empty());
}

#[tokio::test]
#[ignore] // Requires a local Ollama server with the default model pulled
async fn test_ollama_generation() {
    let client = OllamaClient::new(ollama_url(), DEFAULT_OLLAMA_MODEL).unwrap();
    let request = GenerationRequest::new(
        "",
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_temperature(0.0)
    .with_max_tokens(10);

    let response = client.generate(request).await.unwrap();
    assert!(
        response.content().contains('4'),
        "Response should contain '4', got: {}",
        response.content()
    );
    assert!(response.usage.total() > 0, "Should have token usage");
}

#[tokio::test]
#[ignore] // Requires a local Ollama server with the default model pulled
async fn test_agent_keeps_conversation() {
    let provider = Arc::new(OllamaClient::new(ollama_url(), DEFAULT_OLLAMA_MODEL).unwrap());
    let mut agent = LlmAgent::new(provider).with_temperature(0.0);

    let first = agent
        .solve("Remember the word 'lantern'. Reply with OK.")
        .await;
    assert!(!first.communication_failed);

    let second = agent
        .solve("Which word did I ask you to remember? Reply with just the word.")
        .await;
    assert!(second.text.to_lowercase().contains("lantern"), "got: {}", second.text);
    assert_eq!(agent.session().turns(), 2);

    agent.reset();
    assert!(agent.session().is_empty());
}

#[tokio::test]
#[ignore] // Requires AGI_BENCH_API_BASE (and usually AGI_BENCH_API_KEY)
async fn test_chat_completions_generation() {
    let client = ChatCompletionsClient::from_env("gpt-4o-mini").unwrap();
    let request = GenerationRequest::new(
        "",
        vec![Message::user("What is 2 + 2? Reply with just the number.")],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await.unwrap();
    assert!(response.content().contains('4'), "got: {}", response.content());
}
