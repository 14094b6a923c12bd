//! Conversation history.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The model's answers.
    Assistant,
}

impl Role {
    /// The lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Renders the capitalised label used in prompts (`User`, `Assistant`).
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        f.write_str(label)
    }
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the entry.
    pub role: Role,
    /// Entry text.
    pub content: String,
}

impl Message {
    /// Create a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Ordered, append-only question/answer history for one conversation.
///
/// Storage is capped at `max_entries`; once full, the oldest entries are
/// evicted. The cap is independent of how much history a prompt renders.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    entries: VecDeque<Message>,
    max_entries: usize,
}

impl ConversationSession {
    /// Create an empty session retaining at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self { entries: VecDeque::with_capacity(max_entries.min(64)), max_entries }
    }

    /// Append one entry, evicting the oldest if the session is full.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(Message::new(role, content));
    }

    /// Record a completed question/answer exchange.
    ///
    /// Eviction drops whole exchanges: history never starts with an answer
    /// whose question was evicted, unless the cap is a single entry.
    pub fn record_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.append(Role::User, question);
        self.append(Role::Assistant, answer);
        while self.entries.len() > 1 && self.entries.front().is_some_and(|m| m.role == Role::Assistant) {
            self.entries.pop_front();
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All retained entries, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the session holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_renders_capitalised() {
        assert_eq!(Role::User.to_string(), "User");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn append_keeps_order_and_clear_empties() {
        let mut session = ConversationSession::default();
        session.record_turn("q1", "a1");
        session.append(Role::User, "q2");

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], Message::new(Role::User, "q1"));
        assert_eq!(history[1], Message::new(Role::Assistant, "a1"));
        assert_eq!(history[2].content, "q2");

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn oldest_entries_are_evicted_at_capacity() {
        let mut session = ConversationSession::new(4);
        for i in 0..6 {
            session.append(Role::User, format!("m{i}"));
        }
        let contents: Vec<String> = session.history().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn odd_cap_evicts_whole_turns() {
        let mut session = ConversationSession::new(3);
        for i in 0..3 {
            session.record_turn(format!("q{i}"), format!("a{i}"));
        }

        let history = session.history();
        assert_eq!(history, vec![Message::new(Role::User, "q2"), Message::new(Role::Assistant, "a2")]);
    }
}
