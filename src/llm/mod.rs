//! LLM integration for persona-forge.
//!
//! Two layers live here:
//!
//! - [`LlmProvider`] is the chat-completions abstraction. [`OpenAiClient`]
//!   implements it for any OpenAI-compatible endpoint; tests substitute
//!   scripted providers.
//! - [`CompletionClient`] narrows a provider to the single capability the
//!   simulation pipeline needs: submit a prompt at a temperature, get text
//!   back or a transient error.
//!
//! ```ignore
//! use persona_forge::llm::{CompletionClient, OpenAiClient};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(OpenAiClient::from_env()?);
//! let client = CompletionClient::new(provider, "gpt-4o");
//! let text = client.complete("Describe a persona", 0.7).await?;
//! ```

pub mod completion;
pub mod openai;

pub use completion::{CompletionClient, DEFAULT_REQUEST_TIMEOUT};
pub use openai::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, OpenAiClient, Usage,
    DEFAULT_API_BASE, DEFAULT_MODEL,
};
