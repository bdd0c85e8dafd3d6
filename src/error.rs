use thiserror::Error;

/// Failures that abort a single dispatch. They are turned into an `{"error": ...}`
/// reply at the dispatcher boundary and never reach the process level.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("malformed request body: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("request carries neither a message nor an image")]
    EmptyRequest,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
