//! Session storage implementations for SchoolPilot.
//!
//! Sessions live for the lifetime of the process; there is no persistence.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;
