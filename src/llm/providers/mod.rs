//! LLM backend implementations.

pub mod dummy;
pub mod openai_compatible;
