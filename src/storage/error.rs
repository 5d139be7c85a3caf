use thiserror::Error;

use super::entities::TaskId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("invalid task: {0}")]
    InvalidTask(String),
}
