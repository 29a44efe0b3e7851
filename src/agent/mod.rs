//! The agent under test.
//!
//! Benchmarks talk to the model only through [`AgentClient`]. An agent owns
//! one [`ConversationSession`]; benchmarks decide when to [`reset`] it so that
//! state never leaks between independent tasks.
//!
//! Transport failures never surface as errors: `solve` logs them and returns
//! an empty [`Solution`] with `communication_failed` set, which the scorer
//! treats like any other wrong answer.
//!
//! [`reset`]: AgentClient::reset

pub mod llm_agent;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use llm_agent::LlmAgent;
pub use session::ConversationSession;

/// What the agent answered for one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Raw completion text. Empty when communication failed.
    pub text: String,
    /// True when the transport failed and `text` is a placeholder.
    pub communication_failed: bool,
}

impl Solution {
    /// A successful completion.
    pub fn answered(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            communication_failed: false,
        }
    }

    /// Placeholder for a request that never produced a completion.
    pub fn failed() -> Self {
        Self {
            text: String::new(),
            communication_failed: true,
        }
    }
}

/// A conversational agent that can be driven through benchmark tasks.
///
/// `solve` takes `&mut self`: one agent serves one in-flight evaluation at a
/// time.
#[async_trait]
pub trait AgentClient: Send {
    /// Identifier of the model behind this agent.
    fn model(&self) -> &str;

    /// Send a prompt as the next user turn and return the reply.
    async fn solve(&mut self, prompt: &str) -> Solution;

    /// Drop all conversational state.
    fn reset(&mut self);
}

/// Builds independent agents, one per concurrently running benchmark.
pub trait AgentFactory: Send + Sync {
    fn create(&self) -> Box<dyn AgentClient>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Box<dyn AgentClient> + Send + Sync,
{
    fn create(&self) -> Box<dyn AgentClient> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        turns: usize,
    }

    #[async_trait]
    impl AgentClient for Echo {
        fn model(&self) -> &str {
            "echo"
        }

        async fn solve(&mut self, prompt: &str) -> Solution {
            self.turns += 1;
            Solution::answered(prompt)
        }

        fn reset(&mut self) {
            self.turns = 0;
        }
    }

    #[test]
    fn test_solution_constructors() {
        let ok = Solution::answered("42");
        assert_eq!(ok.text, "42");
        assert!(!ok.communication_failed);

        let failed = Solution::failed();
        assert!(failed.text.is_empty());
        assert!(failed.communication_failed);
    }

    #[tokio::test]
    async fn test_closure_factory_builds_fresh_agents() {
        let factory = || Box::new(Echo { turns: 0 }) as Box<dyn AgentClient>;

        let mut first = factory.create();
        first.solve("a").await;
        let second = factory.create();

        assert_eq!(first.model(), "echo");
        assert_eq!(second.model(), "echo");
    }
}
