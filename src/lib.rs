//! persona-forge: batch LLM persona and decision simulations.
//!
//! This library fans a scenario out across demographic attributes, asks a
//! model to invent personas and have each one decide, retries malformed
//! output, tracks batch progress and keeps JSONL audit logs.

// Core modules
pub mod cli;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod template;
pub mod utils;

// Re-export commonly used error types
pub use error::{LlmError, PersonaEditError, SubmissionError, TemplateError};
