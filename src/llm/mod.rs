pub mod ollama;
pub mod provider;

pub use ollama::OllamaProvider;
pub use provider::{ChatInput, ChatMessage, ChatOutput, ChatRole, LlmError, LlmProvider, LlmResult};
