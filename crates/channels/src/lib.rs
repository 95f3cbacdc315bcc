//! Messaging channels for SchoolPilot.
//!
//! Available channels:
//! - **Messenger**: Facebook Messenger via Graph API webhooks and the Send API

pub mod messenger;

pub use messenger::{MAX_MESSAGE_CHARS, MessengerChannel, VerifyQuery, split_message};
