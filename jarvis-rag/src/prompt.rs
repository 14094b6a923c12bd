//! Prompt assembly.
//!
//! The layout is fixed:
//!
//! ```text
//! {system prompt}
//!
//! Context information:
//! 1. {first context}
//! 2. {second context}
//!
//! Recent conversation:
//! User: {earlier question}
//! Assistant: {earlier answer}
//!
//! User: {question}
//! Assistant:
//! ```
//!
//! The context and conversation sections are omitted when empty.

use crate::session::Message;

/// Instruction used when no system prompt is supplied.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Jarvis, a helpful AI assistant. You answer questions based on the provided context and your knowledge.
If the context doesn't contain relevant information, you can use your general knowledge to help, but mention when you're doing so.
Be concise, accurate, and helpful.";

/// Number of history entries rendered by default (five exchanges).
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Builds model input from a system instruction, retrieved context, recent
/// history, and the current question.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
    history_window: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self { system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(), history_window: DEFAULT_HISTORY_WINDOW }
    }
}

impl PromptAssembler {
    /// Create an assembler with the default instruction and history window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set how many of the most recent history entries are rendered.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Build a prompt with the assembler's system prompt.
    pub fn build(&self, question: &str, context: Option<&[String]>, history: &[Message]) -> String {
        self.build_with_system_prompt(question, context, None, history)
    }

    /// Build a prompt, overriding the system prompt for this call only.
    pub fn build_with_system_prompt(
        &self,
        question: &str,
        context: Option<&[String]>,
        system_prompt: Option<&str>,
        history: &[Message],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(system_prompt.unwrap_or(&self.system_prompt));
        prompt.push_str("\n\n");

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str("Context information:\n");
            for (i, text) in context.iter().enumerate() {
                prompt.push_str(&format!("{}. {text}\n", i + 1));
            }
            prompt.push('\n');
        }

        if !history.is_empty() {
            prompt.push_str("Recent conversation:\n");
            let skip = history.len().saturating_sub(self.history_window);
            for message in &history[skip..] {
                prompt.push_str(&format!("{}: {}\n", message.role, message.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("User: {question}\n"));
        prompt.push_str("Assistant:");
        prompt
    }
}
