//! Model provider module

pub mod openai;
pub mod openai_provider;
pub mod provider;

pub use openai::OpenAiClient;
pub use openai_provider::OpenAiProvider;
pub use provider::{ModelProvider, ToolSpec};
