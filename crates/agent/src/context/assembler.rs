//! Prompt assembly for a single advisor turn.
//!
//! The prompt is always `[system] + history + [user]`, where the system turn
//! carries the advisor instructions followed by the rendered corpus.

use schoolpilot_core::message::Message;
use schoolpilot_core::session::Session;

/// Instructions used when no override is configured.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are SchoolPilot, a friendly advisor helping pupils and their parents choose \
a secondary school and a future career. Answer in the language the user writes in. \
Base facts about schools, programs, admission numbers and jobs on the list below; \
if the list does not contain the answer, say so instead of guessing. \
Keep answers short and concrete, and ask a follow-up question when the user's \
interests are unclear.";

/// Builds the message list sent to the provider.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    instructions: String,
}

impl ContextAssembler {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Use `instructions` when set and non-blank, the defaults otherwise.
    pub fn from_override(instructions: Option<String>) -> Self {
        match instructions {
            Some(text) if !text.trim().is_empty() => Self::new(text),
            _ => Self::default(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// The system turn: instructions, a blank line, then the corpus text.
    pub fn system_message(&self, corpus_text: &str) -> Message {
        Message::system(format!("{}\n\n{}", self.instructions, corpus_text))
    }

    /// Assemble the prompt for `new_user_text` on top of `session`'s history.
    ///
    /// Pure: the session is not modified and equal inputs give equal output
    /// (apart from message timestamps).
    pub fn build_prompt(
        &self,
        session: &Session,
        corpus_text: &str,
        new_user_text: &str,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(session.turns.len() + 2);
        messages.push(self.system_message(corpus_text));
        messages.extend(session.turns.iter().cloned());
        messages.push(Message::user(new_user_text));
        messages
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}
