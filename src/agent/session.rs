//! Conversation history for a single agent.

use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// Ordered user/assistant turns plus an optional system prompt.
///
/// A turn is only recorded once the model has answered, so the history never
/// holds a user message without its reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSession {
    system_prompt: Option<String>,
    messages: Vec<Message>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a system prompt that survives [`clear`](Self::clear).
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Messages to send for the next turn: system prompt, history, then `prompt`.
    pub fn request_messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        messages.push(Message::user(prompt));
        messages
    }

    /// Records a completed exchange.
    pub fn record(&mut self, prompt: &str, reply: &str) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(reply));
    }

    /// Forgets every recorded turn.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of completed exchanges.
    pub fn turns(&self) -> usize {
        self.messages.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_messages_order() {
        let mut session = ConversationSession::new().with_system_prompt("Be brief.");
        session.record("Remember 42.", "OK.");

        let messages = session.request_messages("What number?");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "What number?");
    }

    #[test]
    fn test_clear_keeps_system_prompt() {
        let mut session = ConversationSession::new().with_system_prompt("sys");
        session.record("a", "b");
        assert_eq!(session.turns(), 1);

        session.clear();
        assert!(session.is_empty());
        assert_eq!(session.request_messages("next").len(), 2);
    }
}
