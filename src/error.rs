//! Error taxonomy for the agent

/// Errors that can occur while answering a question
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Missing credential or connection string; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Warehouse unreachable or pool exhausted
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The guard rejected a statement
    #[error("{0}")]
    Validation(String),

    /// The statement ran but the warehouse reported a failure
    #[error("{0}")]
    Execution(String),

    /// The model asked for a tool that does not exist
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// The model service failed or answered with something unusable
    #[error("Model error: {0}")]
    Model(String),

    #[error("Timed out after {0}s: {1}")]
    Timeout(u64, String),
}

impl AgentError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Timeout(..) | AgentError::Connectivity(_))
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
