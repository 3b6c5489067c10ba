//! OpenAI chat-completions backend

pub mod client;

pub use client::OpenAiClient;
