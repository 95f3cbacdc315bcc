//! Prompt context assembly.

pub mod assembler;

pub use assembler::{ContextAssembler, DEFAULT_INSTRUCTIONS};
