//! # SchoolPilot Core
//!
//! Domain types, traits, and error definitions for SchoolPilot, a
//! school-and-career advisor that relays conversations to an external LLM.
//! This crate has **no framework dependencies**: it defines the domain model
//! the other crates implement against.
//!
//! Every seam to the outside world is a trait here (`Provider`,
//! `TextToSpeech`, `SpeechToText`, `Channel`, `SessionStore`), so the HTTP
//! layer and the tests can swap implementations freely.

pub mod channel;
pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod speech;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{ChannelError, Error, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use session::{DEFAULT_MAX_TURNS, Session, SessionId, SessionStore};
pub use speech::{SpeechToText, TextToSpeech};
