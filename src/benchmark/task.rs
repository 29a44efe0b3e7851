//! Task model shared by every benchmark.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::ExpectedSolution;

/// The difficulty label of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Picks a value by difficulty.
    pub fn pick<T>(&self, easy: T, medium: T, hard: T) -> T {
        match self {
            Difficulty::Easy => easy,
            Difficulty::Medium => medium,
            Difficulty::Hard => hard,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "Invalid difficulty level '{}': must be 'easy', 'medium', or 'hard'",
                other
            )),
        }
    }
}

/// One unit of evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within a benchmark run.
    pub id: String,
    /// Prompt whose answer is scored.
    pub prompt: String,
    /// Reference the answer is scored against.
    pub expected: ExpectedSolution,
    pub difficulty: Difficulty,
    /// Breakdown key (concept type, task type, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Unscored prompts sent, in order, before `prompt`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        expected: ExpectedSolution,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            expected,
            difficulty,
            category: None,
            context: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_context(mut self, prompts: Vec<String>) -> Self {
        self.context = prompts;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A base task and a transfer task meant to benefit from what the base taught.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPair {
    pub base: Task,
    pub transfer: Task,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("Easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_serde() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        assert!(serde_json::from_str::<Difficulty>("\"impossible\"").is_err());
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("t-1", "2 + 2?", ExpectedSolution::exact("4"), Difficulty::Easy)
            .with_category("arithmetic")
            .with_context(vec!["Warm up.".to_string()])
            .with_metadata("horizon", 5);

        assert_eq!(task.category.as_deref(), Some("arithmetic"));
        assert_eq!(task.context.len(), 1);
        assert_eq!(task.metadata["horizon"], 5);
    }
}
