//! Agent backed by an [`LlmProvider`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AgentClient, ConversationSession, Solution};
use crate::llm::{GenerationRequest, LlmProvider};
use crate::metrics::MetricsCollector;

/// Sends every prompt with the full conversation so far.
pub struct LlmAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    session: ConversationSession,
    temperature: Option<f64>,
}

impl LlmAgent {
    /// Create an agent that uses the provider's default model.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            session: ConversationSession::new(),
            temperature: None,
        }
    }

    /// Overrides the model sent with each request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.session = self.session.with_system_prompt(prompt);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }
}

#[async_trait]
impl AgentClient for LlmAgent {
    fn model(&self) -> &str {
        &self.model
    }

    async fn solve(&mut self, prompt: &str) -> Solution {
        let mut request =
            GenerationRequest::new(self.model.clone(), self.session.request_messages(prompt));
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let metrics = MetricsCollector::new();
        let started = Instant::now();
        match self.provider.generate(request).await {
            Ok(response) => {
                metrics.record_llm_request(
                    &self.model,
                    true,
                    started.elapsed().as_secs_f64(),
                    u64::from(response.usage.prompt_tokens),
                    u64::from(response.usage.completion_tokens),
                );
                debug!(
                    model = %self.model,
                    tokens = response.usage.total(),
                    history_turns = self.session.turns(),
                    "Agent answered"
                );
                self.session.record(prompt, response.content());
                Solution::answered(response.message.content)
            }
            Err(e) => {
                let latency = started.elapsed().as_secs_f64();
                metrics.record_llm_request(&self.model, false, latency, 0, 0);
                warn!(model = %self.model, error = %e, "Error communicating with model endpoint");
                Solution::failed()
            }
        }
    }

    fn reset(&mut self) {
        self.session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerationResponse, Message, Usage};
    use std::sync::Mutex;

    /// Replies with the number of messages it received, or fails on demand.
    struct CountingProvider {
        fail: bool,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.seen.lock().unwrap().push(request.messages.len());
            if self.fail {
                return Err(LlmError::RequestFailed("connection refused".to_string()));
            }
            Ok(GenerationResponse {
                model: request.model,
                message: Message::assistant(request.messages.len().to_string()),
                usage: Usage::default(),
            })
        }

        fn default_model(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_history_grows_and_resets() {
        let provider = Arc::new(CountingProvider {
            fail: false,
            seen: Mutex::new(Vec::new()),
        });
        let mut agent = LlmAgent::new(provider.clone());

        assert_eq!(agent.solve("first").await.text, "1");
        assert_eq!(agent.solve("second").await.text, "3");
        assert_eq!(agent.session().turns(), 2);

        agent.reset();
        assert_eq!(agent.solve("third").await.text, "1");
        assert_eq!(*provider.seen.lock().unwrap(), vec![1, 3, 1]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            seen: Mutex::new(Vec::new()),
        });
        let mut agent = LlmAgent::new(provider).with_model("custom");

        let solution = agent.solve("hello").await;
        assert_eq!(solution, Solution::failed());
        assert!(agent.session().is_empty());
        assert_eq!(agent.model(), "custom");
    }
}
