//! The SchoolPilot advisor.
//!
//! Every request follows the same path:
//!
//! 1. **Receive** a user message (web client, CLI or Messenger)
//! 2. **Build context**: advisor instructions + rendered school corpus +
//!    the session's capped history + the new message
//! 3. **Send to the LLM** via the configured provider
//! 4. **Record** the exchange in the session and return the reply
//!
//! The corpus is loaded and rendered once at startup; sessions live in an
//! injected [`schoolpilot_core::SessionStore`].

pub mod advisor;
pub mod context;
pub mod corpus;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use advisor::Advisor;
pub use context::{ContextAssembler, DEFAULT_INSTRUCTIONS};
pub use corpus::{Contact, CorpusError, KnowledgeCorpus, Program, School, render_corpus};
pub use stream_event::AdvisorStreamEvent;
