//! Conversation state module

pub mod manager;
pub mod message;
pub mod store;

pub use manager::ConversationManager;
pub use message::{Conversation, Message, Role, ToolCall};
pub use store::{ConversationStore, InMemoryStore};
