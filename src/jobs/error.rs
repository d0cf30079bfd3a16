use thiserror::Error;

/// Failure reported by a task handler. Every variant is a soft failure;
/// the worker retries it under the retry policy.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task timed out after {0}ms")]
    Timeout(u64),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        TaskError::InvalidPayload(message.into())
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
