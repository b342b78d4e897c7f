use thiserror::Error;

/// Errors that can occur while processing a single event message
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to parse event message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid face geometry: {0}")]
    Geometry(String),

    #[error("Object storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("Failed to decode photo: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode face: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Database error: {0:#}")]
    Database(anyhow::Error),

    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProcessError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::Parse(_) => "parse",
            ProcessError::Geometry(_) => "geometry",
            ProcessError::Storage(_) => "storage",
            ProcessError::Decode(_) => "decode",
            ProcessError::Encode(_) => "encode",
            ProcessError::Database(_) => "database",
            ProcessError::Task(_) => "task",
        }
    }
}
